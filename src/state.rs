//! Per-round mutable search state.
//!
//! Parallel flat arrays rather than an array-of-structs, per the design
//! notes: `best_times`, `best_non_transfer_times`, and the back-pointer
//! arrays are accessed with divergent patterns (the transfer pass only
//! touches `best_times`; the pattern scan only touches
//! `best_non_transfer_times` and the back-pointers), and keeping them
//! separate lets `min` and the relax steps stay cache-friendly vectorized
//! loops instead of struct-field shuffling. Mirrors the teacher's
//! `arrival_times` / `board_times` split in `RaptorState`, generalized to
//! the five arrays this algorithm needs.

use std::rc::Rc;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;

use crate::error::RaptorError;
use crate::model::transit_layer::{PatternId, StopId};
use crate::time::{Time, UNREACHED};

/// Per-round arrival-time vectors and back-pointers.
///
/// `previous_pattern`/`previous_stop` record the most recent transit leg
/// that improved `best_non_transfer_times`; `transfer_stop` records the
/// stop a transfer arrived from, when the current `best_times` is a
/// transfer rather than a vehicle arrival. The distilled spec represents
/// "no back-pointer" as `-1`; this crate represents it as `None`, which is
/// the idiomatic Rust rendition of the same sentinel and preserves the
/// invariant `best_non_transfer_times[s] < UNREACHED ⇒ previous_pattern[s]`
/// and `previous_stop[s]` are both `Some`.
#[derive(Debug, Clone)]
pub struct RaptorState {
    pub best_times: Vec<Time>,
    pub best_non_transfer_times: Vec<Time>,
    pub previous_pattern: Vec<Option<PatternId>>,
    pub previous_stop: Vec<Option<StopId>>,
    pub transfer_stop: Vec<Option<StopId>>,
    /// Origin departure time for the current search; metadata, stamped
    /// per departure minute by the sweep driver.
    pub departure_time: Time,
    /// Back-link to the prior round's state, for path reconstruction.
    /// Shared by reference on [`RaptorState::copy`]; only
    /// [`RaptorState::deep_copy`] clones the whole chain.
    pub previous: Option<Rc<RaptorState>>,
}

impl RaptorState {
    #[must_use]
    pub fn new(n_stops: usize) -> Self {
        Self {
            best_times: vec![UNREACHED; n_stops],
            best_non_transfer_times: vec![UNREACHED; n_stops],
            previous_pattern: vec![None; n_stops],
            previous_stop: vec![None; n_stops],
            transfer_stop: vec![None; n_stops],
            departure_time: 0,
            previous: None,
        }
    }

    #[must_use]
    pub fn n_stops(&self) -> usize {
        self.best_times.len()
    }

    /// Shallow clone: fresh owned arrays, `previous` shared by `Rc`.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            best_times: self.best_times.clone(),
            best_non_transfer_times: self.best_non_transfer_times.clone(),
            previous_pattern: self.previous_pattern.clone(),
            previous_stop: self.previous_stop.clone(),
            transfer_stop: self.transfer_stop.clone(),
            departure_time: self.departure_time,
            previous: self.previous.clone(),
        }
    }

    /// Full clone, including the entire `previous` chain, each link
    /// recursively deep-copied into its own owned allocation. Used when a
    /// caller archives a per-iteration final-round state
    /// (`statesEachIteration`) and the shared scheduled-search chain must
    /// not be mutated out from under it later.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        let mut copy = self.copy();
        copy.previous = self.previous.as_deref().map(|p| Rc::new(p.deep_copy()));
        copy
    }

    /// Elementwise: for each stop, if `other` is better, adopt it. The two
    /// fields update independently — a stop can take its `best_times` from
    /// `other` while keeping its own `best_non_transfer_times`, or vice
    /// versa. Returns `true` if any stop's `best_times` improved (the
    /// signal range-RAPTOR carry-over and frequency-search floor use to
    /// decide whether a stop needs re-marking).
    pub fn min(&mut self, other: &RaptorState) -> bool {
        let mut improved = false;
        for stop in 0..self.n_stops() {
            if other.best_times[stop] < self.best_times[stop] {
                self.best_times[stop] = other.best_times[stop];
                self.transfer_stop[stop] = other.transfer_stop[stop];
                improved = true;
            }
            if other.best_non_transfer_times[stop] < self.best_non_transfer_times[stop] {
                self.best_non_transfer_times[stop] = other.best_non_transfer_times[stop];
                self.previous_pattern[stop] = other.previous_pattern[stop];
                self.previous_stop[stop] = other.previous_stop[stop];
            }
        }
        improved
    }

    /// Debug path trace: walks the back-pointer chain for `stop`, one line
    /// per leg, most recent first. Non-functional; intended for
    /// `log::trace!` and test failure output, not for parsing.
    #[must_use]
    pub fn dump(&self, stop: StopId) -> String {
        let mut lines = Vec::new();
        let mut state = self;
        let mut current_stop = stop;
        loop {
            let arrival = state.best_non_transfer_times[current_stop];
            match (state.previous_pattern[current_stop], state.previous_stop[current_stop]) {
                (Some(pattern), Some(from_stop)) => {
                    lines.push(format!(
                        "stop {current_stop} via pattern {pattern} from {from_stop}, arrival {arrival}"
                    ));
                    current_stop = from_stop;
                }
                _ => {
                    lines.push(format!("stop {current_stop}: no transit leg (arrival {arrival})"));
                    break;
                }
            }
            match &state.previous {
                Some(prev) => state = prev,
                None => break,
            }
        }
        lines.join("\n")
    }

    /// Debug check: `previous_stop` must form a DAG rooted at the access
    /// stops. Called after each round only in debug builds, per the
    /// design notes — it is O(nStops) and not meant for release builds.
    pub fn assert_acyclic_back_pointers(&self) -> Result<(), RaptorError> {
        let mut graph = DiGraph::<(), ()>::with_capacity(self.n_stops(), self.n_stops());
        let nodes: Vec<_> = (0..self.n_stops()).map(|_| graph.add_node(())).collect();
        for (stop, &from_stop) in self.previous_stop.iter().enumerate() {
            if let Some(from_stop) = from_stop {
                graph.add_edge(nodes[from_stop], nodes[stop], ());
            }
        }
        if is_cyclic_directed(&graph) {
            return Err(RaptorError::CyclicBackPointers);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_all_unreached() {
        let state = RaptorState::new(4);
        assert!(state.best_times.iter().all(|&t| t == UNREACHED));
        assert!(state.best_non_transfer_times.iter().all(|&t| t == UNREACHED));
        assert!(state.transfer_stop.iter().all(Option::is_none));
    }

    #[test]
    fn copy_then_min_is_identity() {
        let mut state = RaptorState::new(3);
        state.best_times[0] = 100;
        state.best_non_transfer_times[1] = 200;
        state.previous_pattern[1] = Some(2);
        state.previous_stop[1] = Some(0);

        let copy = state.copy();
        let mut target = state.clone();
        let improved = target.min(&copy);

        assert!(!improved);
        assert_eq!(target.best_times, state.best_times);
        assert_eq!(target.best_non_transfer_times, state.best_non_transfer_times);
    }

    #[test]
    fn min_updates_both_fields_independently() {
        let mut a = RaptorState::new(2);
        a.best_times[0] = 500;
        a.best_non_transfer_times[0] = 500;

        let mut b = RaptorState::new(2);
        b.best_times[0] = 300;
        b.best_non_transfer_times[0] = 900;
        b.previous_pattern[0] = Some(7);
        b.previous_stop[0] = Some(1);

        let improved = a.min(&b);

        assert!(improved);
        // best_times adopted b's better value...
        assert_eq!(a.best_times[0], 300);
        // ...but best_non_transfer_times keeps its own better value, and
        // does NOT pick up b's back-pointer, since b's value did not win.
        assert_eq!(a.best_non_transfer_times[0], 500);
        assert_eq!(a.previous_pattern[0], None);
    }

    #[test]
    fn copy_shares_previous_by_reference() {
        let base = Rc::new(RaptorState::new(2));
        let mut state = RaptorState::new(2);
        state.previous = Some(base.clone());

        let copy = state.copy();
        assert!(Rc::ptr_eq(copy.previous.as_ref().unwrap(), &base));
    }

    #[test]
    fn acyclic_back_pointers_pass() {
        let mut state = RaptorState::new(3);
        state.previous_stop[1] = Some(0);
        state.previous_stop[2] = Some(1);
        assert!(state.assert_acyclic_back_pointers().is_ok());
    }

    #[test]
    fn cyclic_back_pointers_are_rejected() {
        let mut state = RaptorState::new(2);
        state.previous_stop[0] = Some(1);
        state.previous_stop[1] = Some(0);
        assert_eq!(
            state.assert_acyclic_back_pointers(),
            Err(RaptorError::CyclicBackPointers)
        );
    }

    #[test]
    fn deep_copy_clones_the_previous_chain() {
        let base = Rc::new(RaptorState::new(2));
        let mut state = RaptorState::new(2);
        state.previous = Some(base.clone());

        let deep = state.deep_copy();
        assert!(!Rc::ptr_eq(deep.previous.as_ref().unwrap(), &base));
    }
}
