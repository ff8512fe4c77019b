//! Time representation shared by every component of the core.
//!
//! Times are seconds since service-day midnight, stored as `i32` so the
//! `UNREACHED` sentinel matches the `INT_MAX` convention the algorithm was
//! specified against.

/// Seconds since service-day midnight.
pub type Time = i32;

/// Sentinel meaning "no arrival discovered".
pub const UNREACHED: Time = Time::MAX;

/// Minimum dwell before boarding after arrival at a stop.
pub const BOARD_SLACK_SECONDS: Time = 60;

/// Spacing between scheduled search departures in a range-RAPTOR sweep.
pub const DEPARTURE_STEP_SEC: Time = 60;

/// Default search-wide duration ceiling. "Effectively infinite", but the
/// contract still honors it.
pub const DEFAULT_MAX_DURATION: Time = Time::MAX - 48 * 3600;

/// Adds `a + b`, clamping to [`UNREACHED`] instead of overflowing, and
/// treating either addend already being [`UNREACHED`] as contagious.
#[inline]
#[must_use]
pub fn add_clamped(a: Time, b: Time) -> Time {
    if a == UNREACHED || b == UNREACHED {
        return UNREACHED;
    }
    a.checked_add(b).unwrap_or(UNREACHED)
}
