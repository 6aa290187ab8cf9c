//! Calendar events as fetched from the remote source and annotated by the pipeline.
//!
//! The serialized shape follows the remote item payload (`id`, `status`,
//! `summary`, `eventType`, `start`, `end`) so cached blobs can be read back
//! without translation. Pipeline annotations (`durationMinutes`,
//! `categories`, `origin`) are layered on top.

use std::fmt;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_type::EventType;
use crate::types::{AccountId, CalendarId, EventId};

/// Lifecycle status reported by the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    /// Deleted remotely. Never stored in a sync cache.
    Cancelled,
    /// Any status string this crate does not know about.
    #[serde(other)]
    Other,
}

/// Where an event in a normalized timeline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// Fetched from the remote calendar.
    #[default]
    Remote,
    /// Imputed by sleep inference.
    Sleep,
    /// Placeholder for unaccounted time in a day.
    Untracked,
}

impl EventOrigin {
    const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote)
    }

    /// Short label used in synthetic event ids.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Sleep => "sleep",
            Self::Untracked => "untracked",
        }
    }
}

/// Start or end of an event: either an instant with its originating zone or
/// a bare date for all-day events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    /// A timed boundary. `date_time` keeps the offset the remote reported.
    Timed {
        #[serde(rename = "dateTime")]
        date_time: DateTime<FixedOffset>,
        /// IANA zone name, when the remote supplied one.
        #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
    },
    /// An all-day boundary.
    AllDay { date: NaiveDate },
}

impl EventTime {
    /// Builds a timed boundary.
    pub fn timed(date_time: DateTime<FixedOffset>, time_zone: Option<String>) -> Self {
        Self::Timed {
            date_time,
            time_zone,
        }
    }

    /// Returns the instant for timed boundaries.
    pub const fn instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Timed { date_time, .. } => Some(*date_time),
            Self::AllDay { .. } => None,
        }
    }

    /// Calendar date of this boundary, in the boundary's own offset.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Timed { date_time, .. } => date_time.date_naive(),
            Self::AllDay { date } => *date,
        }
    }

    /// Resolves the zone the boundary was recorded in.
    ///
    /// Falls back to the fixed offset carried by `dateTime` when the zone name
    /// is missing or unknown.
    pub fn zone(&self) -> Option<EventZone> {
        match self {
            Self::Timed {
                date_time,
                time_zone,
            } => Some(
                time_zone
                    .as_deref()
                    .and_then(|name| name.parse::<Tz>().ok())
                    .map_or_else(|| EventZone::Fixed(*date_time.offset()), EventZone::Named),
            ),
            Self::AllDay { .. } => None,
        }
    }
}

/// A timezone an event's wall-clock times are interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventZone {
    /// An IANA zone.
    Named(Tz),
    /// A bare UTC offset.
    Fixed(FixedOffset),
}

impl EventZone {
    /// UTC as a zone.
    pub const UTC: Self = Self::Named(Tz::UTC);

    /// Wall-clock time of `instant` in this zone.
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Named(tz) => instant.with_timezone(tz).naive_local(),
            Self::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }

    /// Instant of a wall-clock time in this zone.
    ///
    /// Ambiguous times resolve to the earlier instant. Times inside a DST gap
    /// move forward by an hour.
    pub fn resolve(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::Named(tz) => tz
                .from_local_datetime(&local)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
                .map_or_else(|| local.and_utc(), |dt| dt.with_timezone(&Utc)),
            Self::Fixed(offset) => (local - Duration::seconds(i64::from(offset.local_minus_utc())))
                .and_utc(),
        }
    }

    /// `instant` expressed with this zone's offset at that instant.
    pub fn fixed(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Named(tz) => instant.with_timezone(tz).fixed_offset(),
            Self::Fixed(offset) => instant.with_timezone(offset),
        }
    }

    /// Wire name for the zone: the IANA name, or `None` for bare offsets.
    pub fn name(&self) -> Option<String> {
        match self {
            Self::Named(tz) => Some(tz.name().to_string()),
            Self::Fixed(_) => None,
        }
    }

    /// Offset of this zone at `instant`.
    pub fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        match self {
            Self::Named(tz) => tz.offset_from_utc_datetime(&instant.naive_utc()).fix(),
            Self::Fixed(offset) => *offset,
        }
    }
}

impl fmt::Display for EventZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tz) => write!(f, "{}", tz.name()),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// One `(categoryPath, displayTitle)` classification of an event.
///
/// Child categories use `parent/child` paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub path: String,
    pub title: String,
}

impl CategoryMatch {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    /// The top-level category this match belongs to.
    pub fn top_level(&self) -> &str {
        self.path.split('/').next().unwrap_or(&self.path)
    }
}

/// One calendar occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Remote-assigned identifier, unique per calendar.
    pub id: EventId,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub event_type: EventType,
    /// Missing on deletion stubs and malformed payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<CalendarId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    /// Whole minutes between start and end until overlap redistribution
    /// turns it into a fractional share.
    #[serde(default)]
    pub duration_minutes: f64,
    /// Classifications in rule-table order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategoryMatch>,
    #[serde(default, skip_serializing_if = "EventOrigin::is_remote")]
    pub origin: EventOrigin,
}

impl Event {
    /// Builds a timed event with zeroed annotations.
    pub fn timed(
        id: EventId,
        summary: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        time_zone: Option<String>,
    ) -> Self {
        Self {
            id,
            status: EventStatus::Confirmed,
            summary: summary.into(),
            event_type: EventType::Default,
            start: Some(EventTime::timed(start, time_zone.clone())),
            end: Some(EventTime::timed(end, time_zone)),
            calendar_id: None,
            account_id: None,
            duration_minutes: 0.0,
            categories: Vec::new(),
            origin: EventOrigin::Remote,
        }
    }

    /// Builds a pipeline-generated event with a deterministic id and its
    /// duration already computed.
    pub fn synthetic(
        origin: EventOrigin,
        summary: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        time_zone: Option<String>,
    ) -> Self {
        let summary = summary.into();
        let key = format!(
            "{}|{summary}|{}|{}",
            origin.as_str(),
            start.to_rfc3339(),
            end.to_rfc3339()
        );
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string();
        let mut event = Self::timed(
            EventId::from_generated(format!("{}-{id}", origin.as_str())),
            summary,
            start,
            end,
            time_zone,
        );
        event.origin = origin;
        event.recompute_duration();
        event
    }

    /// Whether the start is a bare date.
    pub const fn is_all_day(&self) -> bool {
        matches!(self.start, Some(EventTime::AllDay { .. }))
    }

    pub fn start_instant(&self) -> Option<DateTime<FixedOffset>> {
        self.start.as_ref().and_then(EventTime::instant)
    }

    pub fn end_instant(&self) -> Option<DateTime<FixedOffset>> {
        self.end.as_ref().and_then(EventTime::instant)
    }

    /// Start and end instants, when both are timed.
    pub fn span(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        Some((self.start_instant()?, self.end_instant()?))
    }

    /// Calendar date the event starts on.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start.as_ref().map(EventTime::date)
    }

    /// Zone of the start boundary.
    pub fn zone(&self) -> Option<EventZone> {
        self.start.as_ref().and_then(EventTime::zone)
    }

    /// Zone name recorded on the start boundary.
    pub fn time_zone_name(&self) -> Option<&str> {
        match &self.start {
            Some(EventTime::Timed { time_zone, .. }) => time_zone.as_deref(),
            _ => None,
        }
    }

    /// Sets `duration_minutes` from the current start and end.
    ///
    /// Leaves the duration untouched for events without timed boundaries.
    pub fn recompute_duration(&mut self) {
        if let Some((start, end)) = self.span() {
            self.duration_minutes = floor_minutes(end - start);
        }
    }

    /// Replaces the start instant, keeping its zone name.
    pub fn set_start(&mut self, instant: DateTime<FixedOffset>) {
        let time_zone = self.time_zone_name().map(str::to_string);
        self.start = Some(EventTime::timed(instant, time_zone));
    }

    /// Copy of this event over `[start, end)`, with its duration recomputed.
    pub fn with_span(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        let mut part = self.clone();
        let start_zone = self.time_zone_name().map(str::to_string);
        let end_zone = match &self.end {
            Some(EventTime::Timed { time_zone, .. }) => time_zone.clone(),
            _ => start_zone.clone(),
        };
        part.start = Some(EventTime::timed(start, start_zone));
        part.end = Some(EventTime::timed(end, end_zone));
        part.recompute_duration();
        part
    }
}

/// Whole minutes in `duration`, rounded toward negative infinity.
#[expect(
    clippy::cast_precision_loss,
    reason = "minute counts stay far below f64's exact integer range"
)]
pub fn floor_minutes(duration: Duration) -> f64 {
    duration.num_seconds().div_euclid(60) as f64
}

/// Fractional minutes in `duration`.
#[expect(
    clippy::cast_precision_loss,
    reason = "second counts stay far below f64's exact integer range"
)]
pub fn exact_minutes(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 60.0
}

/// Midnight that starts the day after `instant`'s date, in the same offset.
pub fn next_midnight(instant: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let next_day = instant.date_naive() + Duration::days(1);
    instant + (next_day.and_time(NaiveTime::MIN) - instant.naive_local())
}
