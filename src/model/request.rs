//! Inbound request shape and the two "precomputed by someone else" inputs:
//! access times to stops, and walk trees from stops to off-network targets.
//!
//! These are the crate's external interfaces (§6 of the distilled spec):
//! the street-network routing that produces them is out of scope, but the
//! shapes they're handed in as are part of this crate's contract, so they
//! live here as plain data / a minimal trait rather than opaque blobs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::transit_layer::StopId;
use crate::time::Time;

/// Mapping from stop index to access-walk seconds from the search origin.
/// A `Vec` rather than a map: the zeroth round iterates it once per
/// departure minute and the set of access stops is small and dense enough
/// that a map brings no benefit over a flat list.
pub type AccessTimes = Vec<(StopId, Time)>;

/// `(target_index, walk_time_seconds)` pairs pre-baked from the street
/// network for one transit stop ("`stopTrees[s]`" in the distilled spec).
pub type StopTree = Vec<(usize, Time)>;

/// The fixed set of off-network target points propagation writes into.
/// `None` in `SweepDriver` callers means static-site mode: skip
/// propagation entirely and report transit-stop arrival times directly.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    pub n_targets: usize,
    /// Indexed by stop id; `stop_trees[s]` is `s`'s walk tree to targets.
    pub stop_trees: Vec<StopTree>,
}

impl TargetSet {
    #[must_use]
    pub fn new(n_targets: usize, stop_trees: Vec<StopTree>) -> Self {
        Self {
            n_targets,
            stop_trees,
        }
    }
}

/// Non-transit travel time to each target, independent of any transit
/// search (walking or driving the whole way).
pub trait PointSetTimes {
    fn travel_time_to_point(&self, target_index: usize) -> Time;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PointSetTimes for Vec<Time> {
    fn travel_time_to_point(&self, target_index: usize) -> Time {
        self.get(target_index).copied().unwrap_or(crate::time::UNREACHED)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// A departure-time window and search parameters, the inbound analogue of
/// R5's `ProfileRequest`. Serializable so a caller-side HTTP/config layer
/// (out of scope here) can deserialize one straight off the wire without
/// this crate depending on any config-loading machinery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub from_time: Time,
    pub to_time: Time,
    pub date: NaiveDate,
    /// Meters per second.
    pub walk_speed: f64,
    /// Total Monte-Carlo draws desired across the whole window.
    pub monte_carlo_draws: usize,
    /// Overrides [`crate::time::BOARD_SLACK_SECONDS`] when set.
    pub board_slack_seconds: Option<Time>,
    /// Overrides [`crate::time::DEFAULT_MAX_DURATION`] when set.
    pub max_duration: Option<Time>,
}

impl ProfileRequest {
    #[must_use]
    pub fn board_slack_seconds(&self) -> Time {
        self.board_slack_seconds
            .unwrap_or(crate::time::BOARD_SLACK_SECONDS)
    }

    #[must_use]
    pub fn max_duration(&self) -> Time {
        self.max_duration.unwrap_or(crate::time::DEFAULT_MAX_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_request_round_trips_through_json() {
        let request = ProfileRequest {
            from_time: 0,
            to_time: 3600,
            date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            walk_speed: 1.3,
            monte_carlo_draws: 220,
            board_slack_seconds: None,
            max_duration: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        let parsed: ProfileRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.from_time, request.from_time);
        assert_eq!(parsed.monte_carlo_draws, request.monte_carlo_draws);
    }

    #[test]
    fn board_slack_override_is_honored() {
        let request = ProfileRequest {
            from_time: 0,
            to_time: 60,
            date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            walk_speed: 1.3,
            monte_carlo_draws: 1,
            board_slack_seconds: Some(90),
            max_duration: None,
        };
        assert_eq!(request.board_slack_seconds(), 90);
        assert_eq!(request.max_duration(), crate::time::DEFAULT_MAX_DURATION);
    }
}
