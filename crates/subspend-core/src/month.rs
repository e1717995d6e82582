//! Month-granularity calendar model
//!
//! Subscriptions are billed per whole month, so every date in the system is a
//! [`MonthDate`]: a year/month pair with no day. The boundary format is the
//! canonical `MM-YYYY` string; storage sees the first day of the month.

use chrono::{Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Month parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonthParseError {
    /// Text does not follow `MM-YYYY`
    #[error("invalid month format, expected MM-YYYY: {0:?}")]
    Format(String),

    /// Month component outside 1..=12
    #[error("month must be between 01 and 12, got {0}")]
    MonthOutOfRange(u32),

    /// Year component outside 1..=9999
    #[error("year must be between 0001 and 9999, got {0}")]
    YearOutOfRange(i32),

    /// Period text is neither `MM-YYYY` nor `MM-YYYY:MM-YYYY`
    #[error("invalid period, expected MM-YYYY or MM-YYYY:MM-YYYY: {0:?}")]
    Period(String),
}

/// Calendar month (Value Object)
///
/// # Invariants
/// - Month is 1..=12, year is 1..=9999
/// - Held as the first day of the month, so the derived ordering is
///   lexicographic on (year, month)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDate(NaiveDate);

impl MonthDate {
    /// Create from year and month with validation
    pub fn new(year: i32, month: u32) -> Result<Self, MonthParseError> {
        if !(1..=12).contains(&month) {
            return Err(MonthParseError::MonthOutOfRange(month));
        }
        if !(1..=9999).contains(&year) {
            return Err(MonthParseError::YearOutOfRange(year));
        }

        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or(MonthParseError::YearOutOfRange(year))
    }

    /// Parse canonical `MM-YYYY` text
    pub fn parse(text: &str) -> Result<Self, MonthParseError> {
        let format_error = || MonthParseError::Format(text.to_string());

        let (month, year) = text
            .split_once('-')
            .filter(|(m, y)| m.len() == 2 && y.len() == 4)
            .filter(|(m, y)| m.bytes().chain(y.bytes()).all(|b| b.is_ascii_digit()))
            .ok_or_else(format_error)?;

        let month: u32 = month.parse().map_err(|_| format_error())?;
        let year: i32 = year.parse().map_err(|_| format_error())?;

        Self::new(year, month)
    }

    /// Current month (UTC)
    pub fn current() -> Self {
        Self::first_day_of(Utc::now().date_naive())
    }

    /// Month containing the given day
    ///
    /// Fails for days outside years 0001..=9999.
    pub fn from_calendar_day(day: NaiveDate) -> Result<Self, MonthParseError> {
        if !(1..=9999).contains(&day.year()) {
            return Err(MonthParseError::YearOutOfRange(day.year()));
        }
        Ok(Self::first_day_of(day))
    }

    fn first_day_of(day: NaiveDate) -> Self {
        Self(day - Days::new(u64::from(day.day0())))
    }

    /// First day of the month, used as the storage boundary value
    pub fn to_calendar_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Month count from `self` to `other`
    ///
    /// `(year(other) - year(self)) * 12 + (month(other) - month(self))`,
    /// negative when `other` is earlier.
    pub fn months_until(&self, other: &MonthDate) -> i64 {
        i64::from(other.year() - self.year()) * 12 + i64::from(other.month())
            - i64::from(self.month())
    }
}

impl fmt::Display for MonthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month(), self.year())
    }
}

impl FromStr for MonthDate {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MonthDate {
    type Error = MonthParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MonthDate> for String {
    fn from(value: MonthDate) -> Self {
        value.to_string()
    }
}

/// Requested pricing window, both ends inclusive
///
/// Used as-is even when `start > end`; such a range overlaps nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryRange {
    pub start: MonthDate,
    pub end: MonthDate,
}

impl QueryRange {
    pub fn new(start: MonthDate, end: MonthDate) -> Self {
        Self { start, end }
    }

    /// Range from `start` to `end`, or to the current month when `end` is absent
    pub fn until_now_or(start: MonthDate, end: Option<MonthDate>) -> Self {
        Self::new(start, end.unwrap_or_else(MonthDate::current))
    }

    /// Parse a period path value: `MM-YYYY` or `MM-YYYY:MM-YYYY`
    ///
    /// A single month runs until `today`.
    pub fn parse_period(text: &str, today: MonthDate) -> Result<Self, MonthParseError> {
        let mut parts = text.split(':');
        let start = parts.next().filter(|s| !s.is_empty());
        let end = parts.next();

        if parts.next().is_some() {
            return Err(MonthParseError::Period(text.to_string()));
        }

        let start = start.ok_or_else(|| MonthParseError::Period(text.to_string()))?;
        let start = MonthDate::parse(start)?;
        let end = match end {
            Some(end) => MonthDate::parse(end)?,
            None => today,
        };

        Ok(Self::new(start, end))
    }

    /// True when `start > end`
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for QueryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}
