//! Error taxonomy for the core.
//!
//! Per the error-handling design: input-contract violations and internal
//! invariant violations are both returned as `Err`, never panics, so a
//! caller (or a test) can assert on them directly instead of relying on
//! log output.

use thiserror::Error;

use crate::time::Time;

#[derive(Error, Debug, PartialEq)]
pub enum RaptorError {
    #[error("invalid stop index {0}")]
    InvalidStop(usize),
    #[error("invalid pattern index {0}")]
    InvalidPattern(usize),
    #[error("invalid trip index {0} in pattern {1}")]
    InvalidTrip(usize, usize),
    #[error("invalid departure time {0}")]
    InvalidTime(Time),
    #[error("access time must be positive, got {0}")]
    NonPositiveAccessTime(Time),
    #[error("propagated time {0} is before departure time {1}")]
    NegativePropagatedTime(Time, Time),
    #[error(
        "round {round} produced a worse best_times[{stop}] ({new}) than the previous round ({prev})"
    )]
    RoundNotMonotonic {
        round: usize,
        stop: usize,
        new: Time,
        prev: Time,
    },
    #[error("RANDOM boarding assumption reached a frequency entry with non-positive headway")]
    InvalidFrequencyHeadway,
    #[error("sweep produced {produced} iterations, expected {expected}")]
    IterationCountMismatch { produced: usize, expected: usize },
    #[error("empty departure window: from_time {from} >= to_time {to}")]
    EmptyDepartureWindow { from: Time, to: Time },
    #[error("back-pointer chain contains a cycle")]
    CyclicBackPointers,
}
