//! Calendar helpers shared by the aggregator and the scorer

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive date range used for event search windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Construct a range; start/end are swapped if given in reverse order.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Whether `date` falls inside the range (inclusive on both ends)
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days covered, counting both endpoints
    pub fn span_days(&self) -> i64 {
        inclusive_day_span(self.start, self.end)
    }
}

/// Day span between two dates, inclusive of both endpoints.
///
/// A single-day event spans 1; an event running Friday through Sunday
/// spans 3. `end` before `start` clamps to 1.
pub fn inclusive_day_span(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(0) + 1
}

/// Month number (1-12) for a date; convenience for monthly cache keys.
pub fn month_of(date: NaiveDate) -> u32 {
    date.month()
}

/// Short lowercase month name used in cache keys ("jan".."dec")
pub fn month_key(month: u32) -> &'static str {
    match month {
        1 => "jan",
        2 => "feb",
        3 => "mar",
        4 => "apr",
        5 => "may",
        6 => "jun",
        7 => "jul",
        8 => "aug",
        9 => "sep",
        10 => "oct",
        11 => "nov",
        12 => "dec",
        _ => "unknown",
    }
}
