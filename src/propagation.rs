//! Mapping per-stop transit arrival times onto off-network target points.
//!
//! Grounded on the teacher's `process_foot_paths` (every transfer-style
//! relax is "take a precomputed time, add a precomputed walk, overlay if
//! it improves"); here the precomputed walk is a `StopTree` rather than a
//! `transfersForStop` list, and the destination is a target index rather
//! than another stop.

use crate::error::RaptorError;
use crate::model::request::TargetSet;
use crate::time::{Time, UNREACHED};

/// Receives the assembled `iterations × nTargets` matrix plus the
/// per-row averaging mask; computing percentiles from it is the
/// caller's job, not this crate's.
pub trait PropagatedTimesStore {
    fn record_iteration(&mut self, iteration: usize, row: &[Time], include_in_average: bool);
}

/// An in-memory [`PropagatedTimesStore`] that keeps every row, for callers
/// that want the whole matrix rather than streaming percentiles. Rows are
/// indexed by iteration; gaps (if a caller somehow skips an iteration)
/// stay empty.
#[derive(Debug, Clone, Default)]
pub struct MatrixStore {
    pub rows: Vec<Vec<Time>>,
    pub include_in_average: Vec<bool>,
}

impl MatrixStore {
    #[must_use]
    pub fn with_capacity(iterations: usize) -> Self {
        Self {
            rows: vec![Vec::new(); iterations],
            include_in_average: vec![false; iterations],
        }
    }
}

impl PropagatedTimesStore for MatrixStore {
    fn record_iteration(&mut self, iteration: usize, row: &[Time], include_in_average: bool) {
        self.rows[iteration] = row.to_vec();
        self.include_in_average[iteration] = include_in_average;
    }
}

/// `doPropagation`: for every stop touched at any round of the current
/// search, walk its precomputed tree of `(target, walk_seconds)` pairs
/// and overlay an improvement into `times_at_targets`.
///
/// `times_at_transit_stops` and `times_at_targets` are clock times, not
/// elapsed times; the sweep driver subtracts `departure_time` afterward.
pub fn do_propagation(
    targets: &TargetSet,
    touched_stops: impl IntoIterator<Item = usize>,
    times_at_transit_stops: &[Time],
    times_at_targets: &mut [Time],
) -> Result<(), RaptorError> {
    for stop in touched_stops {
        let Some(tree) = targets.stop_trees.get(stop) else {
            continue;
        };
        let base = times_at_transit_stops[stop];
        if base == UNREACHED {
            continue;
        }
        for &(target_index, walk_seconds) in tree {
            if walk_seconds < 0 {
                return Err(RaptorError::NonPositiveAccessTime(walk_seconds));
            }
            let propagated = base + walk_seconds;
            if propagated < base {
                log::warn!(
                    "propagated time {propagated} is before transit-stop time {base} at stop {stop}"
                );
                return Err(RaptorError::NegativePropagatedTime(propagated, base));
            }
            if propagated < times_at_targets[target_index] {
                times_at_targets[target_index] = propagated;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets_with_one_stop_tree(tree: Vec<(usize, Time)>) -> TargetSet {
        TargetSet::new(2, vec![tree])
    }

    #[test]
    fn propagation_overlays_only_improvements() {
        let targets = targets_with_one_stop_tree(vec![(0, 30), (1, 500)]);
        let times_at_stops = vec![1000];
        let mut times_at_targets = vec![1040, UNREACHED];

        do_propagation(&targets, [0], &times_at_stops, &mut times_at_targets).unwrap();

        // 1000 + 30 = 1030 improves on 1040.
        assert_eq!(times_at_targets[0], 1030);
        // 1000 + 500 = 1500 improves on UNREACHED.
        assert_eq!(times_at_targets[1], 1500);
    }

    #[test]
    fn unreached_stop_never_propagates() {
        let targets = targets_with_one_stop_tree(vec![(0, 30)]);
        let times_at_stops = vec![UNREACHED];
        let mut times_at_targets = vec![UNREACHED];

        do_propagation(&targets, [0], &times_at_stops, &mut times_at_targets).unwrap();

        assert_eq!(times_at_targets[0], UNREACHED);
    }

    #[test]
    fn propagating_twice_is_idempotent() {
        let targets = targets_with_one_stop_tree(vec![(0, 30)]);
        let times_at_stops = vec![1000];
        let mut times_at_targets = vec![UNREACHED];

        do_propagation(&targets, [0], &times_at_stops, &mut times_at_targets).unwrap();
        let after_first = times_at_targets.clone();
        do_propagation(&targets, [0], &times_at_stops, &mut times_at_targets).unwrap();

        assert_eq!(times_at_targets, after_first);
    }
}
