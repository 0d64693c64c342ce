//! Date windows requested from the upstream source
//!
//! Windows are half-open `[start, end)` calendar ranges. Anything past
//! "today" is clipped or skipped.

use chrono::{Datelike, NaiveDate};

/// Half-open date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// `[year-month-01, next-month-01)`, clipped to `today` in the current
/// month and skipped for months that have not started yet
pub fn monthly_window(year: i32, month: u32, today: NaiveDate) -> Option<DateWindow> {
    if year > today.year() || (year == today.year() && month > today.month()) {
        return None;
    }

    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let mut end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;

    if year == today.year() && month == today.month() {
        end = today;
    }
    Some(DateWindow { start, end })
}

/// The whole calendar year, clipped to `today` for the current year
pub fn broad_window(year: i32, today: NaiveDate) -> Option<DateWindow> {
    if year > today.year() {
        return None;
    }

    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = if year == today.year() {
        today
    } else {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    };
    Some(DateWindow { start, end })
}
