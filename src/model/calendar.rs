//! Service-calendar evaluation: turning a date into the bitset of service
//! codes active that day.
//!
//! The distilled contract only requires `TransitLayer::active_services_for_date`
//! to exist; this module supplies the concrete weekday-bitmask-plus-exceptions
//! representation, mirroring the calendar/calendar_dates split a GTFS feed
//! uses (see `filter_trips_by_service_day` in the GTFS loader this crate's
//! teacher carries, now applied to an already-built layer instead of during
//! ingestion).

use chrono::{Datelike, NaiveDate, Weekday};
use fixedbitset::FixedBitSet;
use hashbrown::HashMap;

/// One service's validity window, weekday pattern, and day-specific
/// exceptions (GTFS `calendar_dates` semantics: `true` adds the service on
/// that date even if the weekday mask says no, `false` removes it even if
/// the weekday mask says yes).
#[derive(Debug, Clone)]
pub struct ServiceCalendar {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Bit `i` (0 = Monday .. 6 = Sunday) set means the service runs that
    /// weekday within `[start_date, end_date]`.
    pub weekday_mask: u8,
    pub exceptions: HashMap<NaiveDate, bool>,
}

impl ServiceCalendar {
    #[must_use]
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, weekday_mask: u8) -> Self {
        Self {
            start_date,
            end_date,
            weekday_mask,
            exceptions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_exception(mut self, date: NaiveDate, active: bool) -> Self {
        self.exceptions.insert(date, active);
        self
    }

    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if let Some(&exception) = self.exceptions.get(&date) {
            return exception;
        }
        if date < self.start_date || date > self.end_date {
            return false;
        }
        let bit = weekday_bit(date.weekday());
        self.weekday_mask & bit != 0
    }
}

#[must_use]
pub fn weekday_bit(weekday: Weekday) -> u8 {
    1 << weekday.num_days_from_monday()
}

/// Evaluates every calendar in `calendars` against `date`, returning the
/// bitset of active service codes (indexed identically to `calendars`).
#[must_use]
pub fn active_services_for_date(calendars: &[ServiceCalendar], date: NaiveDate) -> FixedBitSet {
    let mut active = FixedBitSet::with_capacity(calendars.len());
    for (service_code, calendar) in calendars.iter().enumerate() {
        if calendar.is_active_on(date) {
            active.set(service_code, true);
        }
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekday_mask_matches_days_in_range() {
        // 2026-08-03 is a Monday.
        let monday = date(2026, 8, 3);
        let calendar = ServiceCalendar::new(monday, date(2026, 8, 31), weekday_bit(Weekday::Mon));
        assert!(calendar.is_active_on(monday));
        assert!(!calendar.is_active_on(date(2026, 8, 4)));
    }

    #[test]
    fn exception_overrides_weekday_mask() {
        let monday = date(2026, 8, 3);
        let tuesday = date(2026, 8, 4);
        let calendar = ServiceCalendar::new(monday, date(2026, 8, 31), weekday_bit(Weekday::Mon))
            .with_exception(tuesday, true)
            .with_exception(monday, false);
        assert!(!calendar.is_active_on(monday));
        assert!(calendar.is_active_on(tuesday));
    }

    #[test]
    fn out_of_range_is_inactive_even_on_matching_weekday() {
        let calendar =
            ServiceCalendar::new(date(2026, 8, 3), date(2026, 8, 3), weekday_bit(Weekday::Mon));
        assert!(!calendar.is_active_on(date(2026, 8, 10)));
    }

    #[test]
    fn active_services_for_date_builds_bitset() {
        let calendars = vec![
            ServiceCalendar::new(date(2026, 8, 3), date(2026, 8, 31), weekday_bit(Weekday::Mon)),
            ServiceCalendar::new(date(2026, 8, 3), date(2026, 8, 31), weekday_bit(Weekday::Tue)),
        ];
        let active = active_services_for_date(&calendars, date(2026, 8, 3));
        assert!(active.contains(0));
        assert!(!active.contains(1));
    }
}
