//! Time window for a validation run
//!
//! A window is a pair of calendar dates, each parsed from a free-form string:
//! `today`, `<N> days ago`, or an ISO-8601 date such as `2024-01-15`.
//! No ordering is enforced between the two ends.

use super::errors::EmapError;
use super::result::Result;
use chrono::{Days, Local, NaiveDate};
use std::fmt;

const DAYS_AGO_SUFFIX: &str = " days ago";

/// Start and end dates of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// First day of the window
    pub start: NaiveDate,
    /// Last day of the window
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Parses both ends relative to the local current date
    ///
    /// # Errors
    ///
    /// Returns [`EmapError::DateParse`] if either string is malformed.
    pub fn new(start: &str, end: &str) -> Result<Self> {
        Self::relative_to(start, end, Local::now().date_naive())
    }

    /// Parses both ends relative to an explicit `today`
    pub fn relative_to(start: &str, end: &str, today: NaiveDate) -> Result<Self> {
        Ok(Self {
            start: parse_date_string(start, today)?,
            end: parse_date_string(end, today)?,
        })
    }

    /// Start stamp formatted for the Java services, e.g. `2024-01-15T00:00:00.00Z`
    pub fn start_stamp(&self) -> String {
        java_midnight_stamp(self.start)
    }

    /// End stamp formatted for the Java services
    pub fn end_stamp(&self) -> String {
        java_midnight_stamp(self.end)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}

/// Converts a date string that may be relative to `today` into a date
pub fn parse_date_string(value: &str, today: NaiveDate) -> Result<NaiveDate> {
    if value == "today" {
        return Ok(today);
    }

    if let Some(count) = value.strip_suffix(DAYS_AGO_SUFFIX) {
        if count.is_empty() {
            return Err(EmapError::DateParse(format!("Invalid date string: {value}")));
        }

        let days: u64 = count
            .parse()
            .map_err(|_| EmapError::DateParse(format!("Invalid date string: {value}")))?;

        return today.checked_sub_days(Days::new(days)).ok_or_else(|| {
            EmapError::DateParse(format!("{value} is before the earliest supported date"))
        });
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| EmapError::DateParse(format!("Failed to parse {value} as a date: {e}")))
}

fn java_midnight_stamp(date: NaiveDate) -> String {
    format!("{}T00:00:00.00Z", date.format("%Y-%m-%d"))
}
