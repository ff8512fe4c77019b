//! Monte-Carlo draw of per-entry boarding-phase offsets for frequency-based
//! services, plus the three boarding assumptions the round engine can use
//! to turn a frequency entry into a concrete board time.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::model::transit_layer::TransitLayer;
use crate::time::Time;

/// How the round engine should treat a frequency entry when deciding
/// whether, and when, it can be boarded. Ignored entirely when a round is
/// run with `use_frequencies = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardingAssumption {
    /// Assume the rider boards the instant a vehicle could possibly be
    /// there: a lower bound on travel time.
    BestCase,
    /// Assume the rider waits a full headway beyond the best case: an
    /// upper bound on travel time.
    WorstCase,
    /// Use a concrete sampled phase offset from [`FrequencyOffsets`]: one
    /// Monte-Carlo draw of a plausible travel time.
    Random,
}

/// Per-pattern, per-trip, per-entry boarding-phase offsets, each drawn
/// uniformly from `[0, headway_seconds)`. Ragged to match
/// `TransitLayer`'s trips (only frequency trips get a non-empty
/// inner vector) and regenerated wholesale before each `RANDOM` draw.
#[derive(Debug, Clone)]
pub struct FrequencyOffsets {
    /// `offsets[pattern][trip][entry]`.
    offsets: Vec<Vec<Vec<Time>>>,
    rng: SmallRng,
}

impl FrequencyOffsets {
    /// Allocates the ragged structure sized to `layer`, with a
    /// nondeterministic seed.
    #[must_use]
    pub fn new(layer: &TransitLayer) -> Self {
        Self::with_rng(layer, SmallRng::from_entropy())
    }

    /// As [`FrequencyOffsets::new`], but with a fixed seed, for
    /// reproducible Monte-Carlo draws across runs.
    #[must_use]
    pub fn with_seed(layer: &TransitLayer, seed: u64) -> Self {
        Self::with_rng(layer, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(layer: &TransitLayer, rng: SmallRng) -> Self {
        let offsets = layer
            .patterns
            .iter()
            .map(|pattern| {
                pattern
                    .trips
                    .iter()
                    .map(|trip| match &trip.frequency {
                        Some(entries) => vec![0; entries.len()],
                        None => Vec::new(),
                    })
                    .collect()
            })
            .collect();
        Self { offsets, rng }
    }

    /// The offset for a given pattern/trip/entry, `0` if the trip is
    /// scheduled or the entry is out of range.
    #[must_use]
    pub fn get(&self, pattern: usize, trip: usize, entry: usize) -> Time {
        self.offsets
            .get(pattern)
            .and_then(|p| p.get(trip))
            .and_then(|t| t.get(entry))
            .copied()
            .unwrap_or(0)
    }

    /// Fills every offset with a fresh uniform draw in
    /// `[0, headway_seconds[entry])`, using `layer` to know each entry's
    /// headway.
    pub fn randomize(&mut self, layer: &TransitLayer) {
        for (pattern, pattern_offsets) in self.offsets.iter_mut().enumerate() {
            let Ok(pattern_data) = layer.pattern(pattern) else {
                continue;
            };
            for (trip_idx, trip_offsets) in pattern_offsets.iter_mut().enumerate() {
                let Some(trip) = pattern_data.trips.get(trip_idx) else {
                    continue;
                };
                let Some(entries) = &trip.frequency else {
                    continue;
                };
                for (entry, offset) in trip_offsets.iter_mut().enumerate() {
                    let headway = entries.headway_seconds[entry];
                    *offset = if headway > 0 {
                        self.rng.gen_range(0..headway)
                    } else {
                        0
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transit_layer::{FrequencyEntries, Pattern, Trip};
    use fixedbitset::FixedBitSet;

    fn layer_with_one_frequency_trip() -> TransitLayer {
        let entries = FrequencyEntries {
            headway_seconds: vec![600],
            start_times: vec![0],
            end_times: vec![3600],
        };
        let trip = Trip::frequency(vec![0, 300], vec![0, 300], 0, entries);
        let mut active = FixedBitSet::with_capacity(1);
        active.set(0, true);
        let pattern = Pattern {
            stops: vec![0, 1],
            has_frequencies: true,
            active_services: active,
            trips: vec![trip],
        };
        TransitLayer::new(vec![pattern], vec![vec![0], vec![0]], vec![vec![], vec![]], vec![])
    }

    #[test]
    fn randomize_keeps_offsets_within_headway() {
        let layer = layer_with_one_frequency_trip();
        let mut offsets = FrequencyOffsets::with_seed(&layer, 42);
        for _ in 0..50 {
            offsets.randomize(&layer);
            let value = offsets.get(0, 0, 0);
            assert!((0..600).contains(&value));
        }
    }

    #[test]
    fn same_seed_produces_same_sequence() {
        let layer = layer_with_one_frequency_trip();
        let mut a = FrequencyOffsets::with_seed(&layer, 7);
        let mut b = FrequencyOffsets::with_seed(&layer, 7);
        for _ in 0..10 {
            a.randomize(&layer);
            b.randomize(&layer);
            assert_eq!(a.get(0, 0, 0), b.get(0, 0, 0));
        }
    }
}
