//! The flattened, pre-indexed timetable.
//!
//! `TransitLayer` is built once per graph (by an out-of-scope ingestion
//! pipeline) and shared read-only across every search. Field layout follows
//! the teacher's `PublicTransitData`: parallel, flat arrays rather than
//! deeply nested structs, because the hot loop in `round` walks patterns
//! and trips by index.

use chrono::NaiveDate;
use fixedbitset::FixedBitSet;

use crate::error::RaptorError;
use crate::model::calendar::{self, ServiceCalendar};
use crate::time::Time;

/// Index of a stop within [`TransitLayer`].
pub type StopId = usize;
/// Index of a pattern within [`TransitLayer`].
pub type PatternId = usize;

/// A (startTime, endTime, headway) triple describing a sequence of
/// anonymous trips on the same pattern. All three arrays have equal
/// length; entry `e` is `(start_times[e], end_times[e], headway_seconds[e])`.
#[derive(Debug, Clone, Default)]
pub struct FrequencyEntries {
    pub headway_seconds: Vec<Time>,
    pub start_times: Vec<Time>,
    pub end_times: Vec<Time>,
}

impl FrequencyEntries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.headway_seconds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headway_seconds.is_empty()
    }
}

/// A single vehicle run over a pattern's stops.
///
/// `arrivals[k]`/`departures[k]` are the clock times at `pattern.stops[k]`.
/// `frequency` is `None` for a scheduled trip, `Some` for a frequency-based
/// one; the two are mutually exclusive per trip.
#[derive(Debug, Clone)]
pub struct Trip {
    pub arrivals: Vec<Time>,
    pub departures: Vec<Time>,
    pub service_code: usize,
    pub frequency: Option<FrequencyEntries>,
}

impl Trip {
    #[must_use]
    pub fn is_frequency(&self) -> bool {
        self.frequency.is_some()
    }

    #[must_use]
    pub fn scheduled(arrivals: Vec<Time>, departures: Vec<Time>, service_code: usize) -> Self {
        Self {
            arrivals,
            departures,
            service_code,
            frequency: None,
        }
    }

    #[must_use]
    pub fn frequency(
        arrivals: Vec<Time>,
        departures: Vec<Time>,
        service_code: usize,
        frequency: FrequencyEntries,
    ) -> Self {
        Self {
            arrivals,
            departures,
            service_code,
            frequency: Some(frequency),
        }
    }
}

/// A unique ordered sequence of stops shared by one or more trips.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub stops: Vec<StopId>,
    pub has_frequencies: bool,
    /// Union, over every trip of this pattern, of `service_code`s that
    /// could possibly run it. Used as a cheap gate before scanning trips.
    pub active_services: FixedBitSet,
    pub trips: Vec<Trip>,
}

impl Pattern {
    #[must_use]
    pub fn n_stops(&self) -> usize {
        self.stops.len()
    }
}

/// A foot-path from one stop to another, as flattened `(to_stop, distance)`
/// pairs attached to the *from* stop.
#[derive(Debug, Clone, Copy)]
pub struct Transfer {
    pub to_stop: StopId,
    pub distance_meters: f64,
}

/// The flattened, pre-indexed, read-only timetable.
#[derive(Debug, Clone)]
pub struct TransitLayer {
    pub patterns: Vec<Pattern>,
    pub patterns_for_stop: Vec<Vec<PatternId>>,
    pub transfers_for_stop: Vec<Vec<Transfer>>,
    pub calendars: Vec<ServiceCalendar>,
}

impl TransitLayer {
    #[must_use]
    pub fn new(
        patterns: Vec<Pattern>,
        patterns_for_stop: Vec<Vec<PatternId>>,
        transfers_for_stop: Vec<Vec<Transfer>>,
        calendars: Vec<ServiceCalendar>,
    ) -> Self {
        Self {
            patterns,
            patterns_for_stop,
            transfers_for_stop,
            calendars,
        }
    }

    #[must_use]
    pub fn n_stops(&self) -> usize {
        self.patterns_for_stop.len()
    }

    #[must_use]
    pub fn n_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// True if the layer has at least one frequency-based pattern; the
    /// sweep only performs frequency iterations when this holds.
    #[must_use]
    pub fn has_frequencies(&self) -> bool {
        self.patterns.iter().any(|p| p.has_frequencies)
    }

    /// True if any pattern carries at least one scheduled (non-frequency)
    /// trip; the frequency search re-marks frequency patterns each round
    /// only while this holds, since a scheduled leg is what could reach
    /// them again later.
    #[must_use]
    pub fn has_scheduled_service(&self) -> bool {
        self.patterns
            .iter()
            .any(|p| p.trips.iter().any(|t| t.frequency.is_none()))
    }

    pub fn validate_stop(&self, stop: StopId) -> Result<(), RaptorError> {
        if stop >= self.n_stops() {
            Err(RaptorError::InvalidStop(stop))
        } else {
            Ok(())
        }
    }

    pub fn pattern(&self, pattern_id: PatternId) -> Result<&Pattern, RaptorError> {
        self.patterns
            .get(pattern_id)
            .ok_or(RaptorError::InvalidPattern(pattern_id))
    }

    pub fn patterns_for_stop(&self, stop: StopId) -> Result<&[PatternId], RaptorError> {
        self.validate_stop(stop)?;
        Ok(&self.patterns_for_stop[stop])
    }

    pub fn transfers_for_stop(&self, stop: StopId) -> Result<&[Transfer], RaptorError> {
        self.validate_stop(stop)?;
        Ok(&self.transfers_for_stop[stop])
    }

    /// `getActiveServicesForDate`: the bitset of service codes running on
    /// `date`, indexed identically to `calendars`.
    #[must_use]
    pub fn active_services_for_date(&self, date: NaiveDate) -> FixedBitSet {
        calendar::active_services_for_date(&self.calendars, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn single_pattern_layer() -> TransitLayer {
        let trip = Trip::scheduled(vec![900, 1200], vec![900, 1200], 0);
        let mut active = FixedBitSet::with_capacity(1);
        active.set(0, true);
        let pattern = Pattern {
            stops: vec![0, 1],
            has_frequencies: false,
            active_services: active,
            trips: vec![trip],
        };
        let calendar = ServiceCalendar::new(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            calendar::weekday_bit(Weekday::Mon) | calendar::weekday_bit(Weekday::Tue),
        );
        TransitLayer::new(
            vec![pattern],
            vec![vec![0], vec![0]],
            vec![vec![], vec![]],
            vec![calendar],
        )
    }

    #[test]
    fn n_stops_and_patterns_match_fixture() {
        let layer = single_pattern_layer();
        assert_eq!(layer.n_stops(), 2);
        assert_eq!(layer.n_patterns(), 1);
        assert!(!layer.has_frequencies());
    }

    #[test]
    fn validate_stop_rejects_out_of_range() {
        let layer = single_pattern_layer();
        assert!(layer.validate_stop(1).is_ok());
        assert_eq!(layer.validate_stop(2), Err(RaptorError::InvalidStop(2)));
    }
}
