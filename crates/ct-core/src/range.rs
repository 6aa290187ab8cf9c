//! Date ranges for fetching and normalizing events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use thiserror::Error;

/// Range validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// `from` is after `to`.
    #[error("range start {from} is after range end {to}")]
    Inverted {
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    },
    /// A wall-clock boundary does not exist in the requested offset.
    #[error("invalid local time {0}")]
    InvalidLocalTime(String),
    /// Unknown preset name.
    #[error("unknown date preset: {0}")]
    UnknownPreset(String),
}

/// An inclusive `[from, to]` instant range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: DateTime<FixedOffset>,
    to: DateTime<FixedOffset>,
}

impl DateRange {
    /// Creates a range, rejecting inverted bounds.
    pub fn new(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> Result<Self, RangeError> {
        if from > to {
            return Err(RangeError::Inverted { from, to });
        }
        Ok(Self { from, to })
    }

    /// Whole local days: `from` at 00:00:00 through `to` at 23:59:59.
    pub fn days(from: NaiveDate, to: NaiveDate, offset: FixedOffset) -> Result<Self, RangeError> {
        let start = local(offset, from, NaiveTime::MIN)?;
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        let end = local(offset, to, end_of_day)?;
        Self::new(start, end)
    }

    pub const fn from(&self) -> DateTime<FixedOffset> {
        self.from
    }

    pub const fn to(&self) -> DateTime<FixedOffset> {
        self.to
    }

    /// Whether `instant` falls inside the range, bounds included.
    pub fn contains(&self, instant: DateTime<FixedOffset>) -> bool {
        self.from <= instant && instant <= self.to
    }

    /// Whether `date` falls inside the date-only projection of the range.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.from.date_naive() <= date && date <= self.to.date_naive()
    }
}

fn local(
    offset: FixedOffset,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<DateTime<FixedOffset>, RangeError> {
    let naive = date.and_time(time);
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| RangeError::InvalidLocalTime(naive.to_string()))
}

/// Common date-range shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    Today,
    Yesterday,
    ThisWeek,
    Last7Days,
    Last14Days,
    ThisMonth,
}

impl DatePreset {
    pub const ALL: [Self; 6] = [
        Self::Today,
        Self::Yesterday,
        Self::ThisWeek,
        Self::Last7Days,
        Self::Last14Days,
        Self::ThisMonth,
    ];

    /// First and last local date covered, relative to `today`.
    pub fn dates(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Today => (today, today),
            Self::Yesterday => {
                let yesterday = today - Duration::days(1);
                (yesterday, yesterday)
            }
            Self::ThisWeek => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (monday, today)
            }
            Self::Last7Days => (today - Duration::days(7), today),
            Self::Last14Days => (today - Duration::days(14), today),
            Self::ThisMonth => (today.with_day(1).unwrap_or(today), today),
        }
    }

    /// The preset as a whole-day range in `offset`.
    pub fn range(self, today: NaiveDate, offset: FixedOffset) -> Result<DateRange, RangeError> {
        let (from, to) = self.dates(today);
        DateRange::days(from, to, offset)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::ThisWeek => "this-week",
            Self::Last7Days => "last-7-days",
            Self::Last14Days => "last-14-days",
            Self::ThisMonth => "this-month",
        }
    }
}

impl fmt::Display for DatePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatePreset {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == s)
            .ok_or_else(|| RangeError::UnknownPreset(s.to_string()))
    }
}
