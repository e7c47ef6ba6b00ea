//! Inclusive calendar date ranges for transaction queries.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::{Date, macros::format_description};

use crate::Error;

/// A validated, inclusive range of calendar dates.
///
/// Equality and hashing are by calendar value, so ranges parsed from
/// differently formatted strings that name the same days are the same range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedDateRange")]
pub struct DateRange {
    start: Date,
    end: Date,
}

/// The serialized form of a [DateRange], checked on the way in.
#[derive(Deserialize)]
struct UncheckedDateRange {
    start: Date,
    end: Date,
}

impl TryFrom<UncheckedDateRange> for DateRange {
    type Error = Error;

    fn try_from(value: UncheckedDateRange) -> Result<Self, Self::Error> {
        Self::new(value.start, value.end)
    }
}

impl DateRange {
    /// Create a range covering `start` through `end`, both inclusive.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] if `start` is after `end`.
    pub fn new(start: Date, end: Date) -> Result<Self, Error> {
        if start > end {
            return Err(Error::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
                reason: "start date cannot be after end date".to_owned(),
            });
        }

        Ok(Self { start, end })
    }

    /// Parse a range from two `YYYY-MM-DD` strings.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] if either string is not a valid date
    /// or if the start is after the end.
    pub fn parse(start: &str, end: &str) -> Result<Self, Error> {
        let invalid = |which: &str, value: &str| Error::InvalidDateRange {
            start: start.to_owned(),
            end: end.to_owned(),
            reason: format!("invalid {which} date \"{value}\", expected YYYY-MM-DD"),
        };

        let start_date = parse_day(start.trim()).ok_or_else(|| invalid("start", start))?;
        let end_date = parse_day(end.trim()).ok_or_else(|| invalid("end", end))?;

        Self::new(start_date, end_date).map_err(|_| Error::InvalidDateRange {
            start: start.to_owned(),
            end: end.to_owned(),
            reason: "start date cannot be after end date".to_owned(),
        })
    }

    /// The first day in the range.
    pub fn start(&self) -> Date {
        self.start
    }

    /// The last day in the range.
    pub fn end(&self) -> Date {
        self.end
    }

    /// The exclusive upper bound used in SQL: the day after [DateRange::end].
    ///
    /// Stored dates may carry a time of day, so comparing against the start of
    /// the next day keeps transactions later on the end date.
    pub(crate) fn end_exclusive(&self) -> Result<Date, Error> {
        self.end.next_day().ok_or_else(|| Error::InvalidDateRange {
            start: self.start.to_string(),
            end: self.end.to_string(),
            reason: "end date is the last representable date".to_owned(),
        })
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Parse a single `YYYY-MM-DD` date.
///
/// # Errors
/// Returns [Error::InvalidDateRange] naming `text` as both bounds if it is not
/// a valid date.
pub fn parse_date(text: &str) -> Result<Date, Error> {
    parse_day(text.trim()).ok_or_else(|| Error::InvalidDateRange {
        start: text.to_owned(),
        end: text.to_owned(),
        reason: format!("invalid date \"{text}\", expected YYYY-MM-DD"),
    })
}

/// Parse the calendar date at the start of a stored `TRANSDATE` value, which
/// may be followed by a time component.
pub(crate) fn parse_stored_date(text: &str) -> Option<Date> {
    text.get(..10).and_then(parse_day)
}

fn parse_day(text: &str) -> Option<Date> {
    Date::parse(text, format_description!("[year]-[month]-[day]")).ok()
}
