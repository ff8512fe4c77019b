//! `RoundEngine`: one RAPTOR round — scan marked patterns, optionally
//! attempt frequency boarding, relax arrivals, apply transfers.
//!
//! This is the hot inner loop of the whole crate; it follows the teacher's
//! `default_raptor.rs` (scheduled boarding, earlier-trip switch) and
//! `range_raptor.rs` (transfer relaxation over a marked-stop bitset)
//! closely, generalized with a frequency sub-pass the teacher doesn't
//! have.

use fixedbitset::FixedBitSet;

use crate::error::RaptorError;
use crate::frequency::{BoardingAssumption, FrequencyOffsets};
use crate::model::transit_layer::{Pattern, PatternId, StopId, Transfer, TransitLayer, Trip};
use crate::state::RaptorState;
use crate::time::{add_clamped, Time, UNREACHED};

/// Everything a round needs to know about the day and the request that
/// doesn't change round to round.
pub struct RoundContext<'a> {
    pub layer: &'a TransitLayer,
    pub active_services: &'a FixedBitSet,
    pub walk_speed: f64,
    pub board_slack_seconds: Time,
    pub max_time: Time,
}

/// The three touched-stop/pattern bitsets, each with its own lifetime (see
/// the design notes): `patterns_touched_this_round` selects which patterns
/// the next round scans and is rebuilt every round by `do_transfers`;
/// `stops_touched_this_round` accumulates this round's vehicle-boarding
/// improvements and is cleared at the top of every round;
/// `stops_touched_this_search` accumulates across every round of one
/// search and is cleared only when a new search begins — propagation
/// reads this one.
#[derive(Debug, Clone)]
pub struct TouchedSets {
    pub patterns_touched_this_round: FixedBitSet,
    pub stops_touched_this_round: FixedBitSet,
    pub stops_touched_this_search: FixedBitSet,
}

impl TouchedSets {
    #[must_use]
    pub fn new(n_patterns: usize, n_stops: usize) -> Self {
        Self {
            patterns_touched_this_round: FixedBitSet::with_capacity(n_patterns),
            stops_touched_this_round: FixedBitSet::with_capacity(n_stops),
            stops_touched_this_search: FixedBitSet::with_capacity(n_stops),
        }
    }

    /// Start of a new scheduled or frequency search: all three sets start
    /// empty.
    pub fn reset_for_search(&mut self) {
        self.patterns_touched_this_round.clear();
        self.stops_touched_this_round.clear();
        self.stops_touched_this_search.clear();
    }

    fn mark_patterns_for_stop(&mut self, layer: &TransitLayer, stop: StopId) -> Result<(), RaptorError> {
        for &pattern in layer.patterns_for_stop(stop)? {
            self.patterns_touched_this_round.set(pattern, true);
        }
        Ok(())
    }
}

/// Performs a single RAPTOR round. Returns `true` if any stop's
/// `best_times` improved — equivalently, whether the freshly rebuilt
/// `patterns_touched_this_round` is non-empty once this call returns.
pub struct RoundEngine;

impl RoundEngine {
    pub fn do_one_round(
        ctx: &RoundContext,
        touched: &mut TouchedSets,
        offsets: Option<&FrequencyOffsets>,
        boarding_assumption: BoardingAssumption,
        use_frequencies: bool,
        input_state: &RaptorState,
        output_state: &mut RaptorState,
    ) -> Result<bool, RaptorError> {
        touched.stops_touched_this_round.clear();

        let pattern_ids: Vec<PatternId> = touched.patterns_touched_this_round.ones().collect();
        for pattern_id in pattern_ids {
            let pattern = ctx.layer.pattern(pattern_id)?;
            if !services_intersect(&pattern.active_services, ctx.active_services) {
                continue;
            }

            let boarded_as_frequency = if use_frequencies && pattern.has_frequencies {
                Self::frequency_subpass(
                    ctx,
                    touched,
                    offsets,
                    boarding_assumption,
                    input_state,
                    output_state,
                    pattern_id,
                    pattern,
                )?
            } else {
                false
            };

            if !boarded_as_frequency {
                Self::scheduled_subpass(ctx, touched, input_state, output_state, pattern_id, pattern);
            }
        }

        let improved = Self::do_transfers(ctx, touched, output_state)?;

        #[cfg(debug_assertions)]
        output_state.assert_acyclic_back_pointers()?;

        Ok(improved)
    }

    #[allow(clippy::too_many_arguments)]
    fn frequency_subpass(
        ctx: &RoundContext,
        touched: &mut TouchedSets,
        offsets: Option<&FrequencyOffsets>,
        boarding_assumption: BoardingAssumption,
        input_state: &RaptorState,
        output_state: &mut RaptorState,
        pattern_id: PatternId,
        pattern: &Pattern,
    ) -> Result<bool, RaptorError> {
        let mut best_freq_trip: Option<usize> = None;
        let mut best_freq_board_stop = 0usize;
        let mut best_freq_board_stop_index: StopId = 0;
        let mut best_freq_board_time: Time = UNREACHED;

        for (k, &stop) in pattern.stops.iter().enumerate() {
            let remain_on_board_time = match best_freq_trip {
                Some(trip_idx) => {
                    let trip = &pattern.trips[trip_idx];
                    best_freq_board_time + trip.arrivals[k] - trip.departures[best_freq_board_stop]
                }
                None => UNREACHED,
            };

            if input_state.best_times[stop] != UNREACHED {
                let slack = input_state.best_times[stop] + ctx.board_slack_seconds;
                for (trip_idx, trip) in pattern.trips.iter().enumerate() {
                    let Some(entries) = &trip.frequency else {
                        continue;
                    };
                    if !ctx.active_services.contains(trip.service_code) {
                        continue;
                    }
                    let departure_k = trip.departures[k];
                    let candidate = Self::best_frequency_board_time(
                        entries,
                        departure_k,
                        slack,
                        boarding_assumption,
                        offsets,
                        pattern_id,
                        trip_idx,
                    )?;
                    if let Some(board_time) = candidate {
                        if board_time < remain_on_board_time && board_time < best_freq_board_time {
                            best_freq_trip = Some(trip_idx);
                            best_freq_board_stop = k;
                            best_freq_board_stop_index = stop;
                            best_freq_board_time = board_time;
                        }
                    }
                }
            }

            if remain_on_board_time != UNREACHED && remain_on_board_time < ctx.max_time {
                relax_stop(
                    output_state,
                    touched,
                    pattern_id,
                    stop,
                    remain_on_board_time,
                    best_freq_board_stop_index,
                );
            }
        }

        Ok(best_freq_trip.is_some())
    }

    /// The minimum board time across every entry of one frequency trip at
    /// one stop position, or `None` if no entry can be boarded.
    fn best_frequency_board_time(
        entries: &crate::model::transit_layer::FrequencyEntries,
        departure_at_stop: Time,
        slack: Time,
        boarding_assumption: BoardingAssumption,
        offsets: Option<&FrequencyOffsets>,
        pattern_id: PatternId,
        trip_idx: usize,
    ) -> Result<Option<Time>, RaptorError> {
        let mut min_board_time: Option<Time> = None;
        for entry in 0..entries.len() {
            let headway = entries.headway_seconds[entry];
            let start = entries.start_times[entry];
            let end = entries.end_times[entry];

            let candidate = match boarding_assumption {
                BoardingAssumption::BestCase => {
                    if slack <= end + departure_at_stop {
                        Some(slack.max(start + departure_at_stop))
                    } else {
                        None
                    }
                }
                BoardingAssumption::WorstCase => {
                    if slack <= end + departure_at_stop - headway {
                        Some((slack + headway).max(start + departure_at_stop + headway))
                    } else {
                        None
                    }
                }
                BoardingAssumption::Random => {
                    if headway <= 0 {
                        return Err(RaptorError::InvalidFrequencyHeadway);
                    }
                    let offset = offsets.map_or(0, |o| o.get(pattern_id, trip_idx, entry));
                    let mut board = start + departure_at_stop + offset;
                    while board < slack {
                        board += headway;
                    }
                    let terminal_departure = board - departure_at_stop;
                    if terminal_departure > end { None } else { Some(board) }
                }
            };

            if let Some(value) = candidate {
                min_board_time = Some(min_board_time.map_or(value, |m: Time| m.min(value)));
            }
        }
        Ok(min_board_time)
    }

    fn scheduled_subpass(
        ctx: &RoundContext,
        touched: &mut TouchedSets,
        input_state: &RaptorState,
        output_state: &mut RaptorState,
        pattern_id: PatternId,
        pattern: &Pattern,
    ) {
        let mut on_trip: Option<usize> = None;
        let mut board_stop_index: StopId = 0;

        for (k, &stop) in pattern.stops.iter().enumerate() {
            if on_trip.is_none() && input_state.best_times[stop] != UNREACHED {
                let threshold = input_state.best_times[stop] + ctx.board_slack_seconds;
                if let Some(trip_idx) =
                    first_boardable_trip(pattern, k, ctx.active_services, threshold)
                {
                    on_trip = Some(trip_idx);
                    board_stop_index = stop;
                }
            }

            let Some(mut trip_idx) = on_trip else { continue };

            let prev_best = input_state.best_times[stop];
            if prev_best != UNREACHED && prev_best < pattern.trips[trip_idx].departures[k] {
                let threshold = prev_best + ctx.board_slack_seconds;
                if let Some(new_idx) =
                    earlier_boardable_trip(pattern, k, ctx.active_services, trip_idx, threshold)
                {
                    trip_idx = new_idx;
                    board_stop_index = stop;
                    on_trip = Some(trip_idx);
                }
            }

            let arrival_time = pattern.trips[trip_idx].arrivals[k];
            if arrival_time > ctx.max_time {
                break;
            }
            relax_stop(output_state, touched, pattern_id, stop, arrival_time, board_stop_index);
        }
    }

    /// `doTransfers`: rebuilds `patterns_touched_this_round` from the
    /// stops this round's pattern scan improved, walking each stop's
    /// foot-paths. Never touches `best_non_transfer_times`.
    fn do_transfers(
        ctx: &RoundContext,
        touched: &mut TouchedSets,
        state: &mut RaptorState,
    ) -> Result<bool, RaptorError> {
        touched.patterns_touched_this_round.clear();

        let improved_stops: Vec<StopId> = touched.stops_touched_this_round.ones().collect();
        for stop in improved_stops {
            touched.mark_patterns_for_stop(ctx.layer, stop)?;

            let from_time = state.best_non_transfer_times[stop];
            for &Transfer { to_stop, distance_meters } in ctx.layer.transfers_for_stop(stop)? {
                let walk_seconds = (distance_meters / ctx.walk_speed).round() as Time;
                let to_time = add_clamped(from_time, walk_seconds);
                if to_time < ctx.max_time && to_time < state.best_times[to_stop] {
                    state.best_times[to_stop] = to_time;
                    state.transfer_stop[to_stop] = Some(stop);
                    touched.mark_patterns_for_stop(ctx.layer, to_stop)?;
                }
            }
        }

        Ok(!touched.patterns_touched_this_round.is_clear())
    }
}

fn services_intersect(a: &FixedBitSet, b: &FixedBitSet) -> bool {
    a.ones().any(|bit| b.contains(bit))
}

fn is_boardable_scheduled_trip(trip: &Trip, active_services: &FixedBitSet) -> bool {
    trip.frequency.is_none() && active_services.contains(trip.service_code)
}

fn first_boardable_trip(
    pattern: &Pattern,
    stop_pos: usize,
    active_services: &FixedBitSet,
    threshold_exclusive: Time,
) -> Option<usize> {
    pattern
        .trips
        .iter()
        .enumerate()
        .filter(|(_, trip)| is_boardable_scheduled_trip(trip, active_services))
        .find(|(_, trip)| trip.departures[stop_pos] > threshold_exclusive)
        .map(|(idx, _)| idx)
}

/// Walks backward from (but not including) `current_idx`, adopting each
/// still-boardable earlier trip, stopping at the first one that fails the
/// departure-time inequality.
fn earlier_boardable_trip(
    pattern: &Pattern,
    stop_pos: usize,
    active_services: &FixedBitSet,
    current_idx: usize,
    threshold_exclusive: Time,
) -> Option<usize> {
    let mut best = None;
    let mut idx = current_idx;
    while idx > 0 {
        idx -= 1;
        let trip = &pattern.trips[idx];
        if !is_boardable_scheduled_trip(trip, active_services) {
            continue;
        }
        if trip.departures[stop_pos] > threshold_exclusive {
            best = Some(idx);
        } else {
            break;
        }
    }
    best
}

fn relax_stop(
    output_state: &mut RaptorState,
    touched: &mut TouchedSets,
    pattern_id: PatternId,
    stop: StopId,
    arrival: Time,
    board_stop: StopId,
) {
    if arrival < output_state.best_non_transfer_times[stop] {
        output_state.best_non_transfer_times[stop] = arrival;
        output_state.previous_pattern[stop] = Some(pattern_id);
        output_state.previous_stop[stop] = Some(board_stop);
        touched.stops_touched_this_round.set(stop, true);
        touched.stops_touched_this_search.set(stop, true);

        if arrival < output_state.best_times[stop] {
            output_state.best_times[stop] = arrival;
            output_state.transfer_stop[stop] = None;
        }
    }
}
