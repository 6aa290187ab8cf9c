//! Sleep imputation from sparse sleep/wake markers.
//!
//! # Algorithm
//!
//! 1. Aggregate events per calendar date: first start, last end, the latest
//!    wake-up marker (end-marker summaries, at their start) and sleep marker
//!    (start-marker summaries, at their end). A sleep marker that starts
//!    before `post_midnight_hour` belongs to the night before.
//! 2. For each pair of consecutive days, synthesize the night between them:
//!    - sleep and wake markers: marker to marker
//!    - sleep marker only: until `min(marker + daily sleep, next first event)`
//!    - wake marker only: from `max(marker - daily sleep, previous last event)`
//!    - neither: from `max(last event, 21:00)` for the daily sleep duration,
//!      capped at the next first event
//! 3. The first day gets sleep from midnight (or the post-midnight marker)
//!    until its wake marker or first event. The last day, unless it is today,
//!    gets sleep from its sleep marker or last event until midnight.
//!
//! Every interval is split at local midnight. Parts shorter than a minute are
//! dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{Event, EventOrigin, EventZone, floor_minutes};
use crate::rules::compile_prefix;

/// Summary given to imputed sleep events.
pub const SLEEP_SUMMARY: &str = "Sleeping";

/// Earliest local time a night without markers starts.
pub const NIGHT_START: NaiveTime = match NaiveTime::from_hms_opt(21, 0, 0) {
    Some(time) => time,
    None => panic!("21:00 is a valid time"),
};

/// Upper bound accepted for `daily_sleep_hours`.
pub const MAX_DAILY_SLEEP_HOURS: f64 = 24.0;

/// Sleep inference errors.
#[derive(Debug, Error)]
pub enum SleepError {
    /// A marker pattern is not a valid regular expression.
    #[error("invalid {which} marker pattern {pattern:?}: {source}")]
    InvalidMarker {
        which: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// `daily_sleep_hours` is not a finite number in `0..=24`.
    #[error("invalid daily sleep hours {hours}: expected a value between 0 and 24")]
    InvalidDailySleep { hours: f64 },
    /// A sleep interval would start and end in different timezones.
    #[error("sleep interval starts in {start} but ends in {end}")]
    TimezoneMismatch { start: String, end: String },
}

/// User sleep preferences.
///
/// Nights without any marker start no earlier than [`NIGHT_START`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepPreferences {
    /// Summary pattern of events logged when going to sleep.
    pub start_marker: Option<String>,
    /// Summary pattern of events logged when waking up.
    pub end_marker: Option<String>,
    pub daily_sleep_hours: f64,
    /// Sleep markers starting before this local hour count toward the
    /// previous night.
    pub post_midnight_hour: u32,
}

impl Default for SleepPreferences {
    fn default() -> Self {
        Self {
            start_marker: None,
            end_marker: None,
            daily_sleep_hours: 8.0,
            post_midnight_hour: 10,
        }
    }
}

impl SleepPreferences {
    /// Whether both marker patterns are configured.
    pub fn has_markers(&self) -> bool {
        self.start_marker.as_deref().is_some_and(|m| !m.is_empty())
            && self.end_marker.as_deref().is_some_and(|m| !m.is_empty())
    }

    /// Daily sleep duration, rounded to the minute.
    ///
    /// Fails unless the configured hours are finite and within
    /// `0..=MAX_DAILY_SLEEP_HOURS`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "hours are bounded above; rounding to whole minutes is intended"
    )]
    pub fn daily_sleep(&self) -> Result<Duration, SleepError> {
        let hours = self.daily_sleep_hours;
        if !(0.0..=MAX_DAILY_SLEEP_HOURS).contains(&hours) {
            return Err(SleepError::InvalidDailySleep { hours });
        }
        Ok(Duration::minutes((hours * 60.0).round() as i64))
    }
}

/// Per-date aggregate used to anchor sleep intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAggregate {
    pub wakeup_marker: Option<DateTime<Utc>>,
    pub sleep_marker: Option<DateTime<Utc>>,
    /// Post-midnight sleep marker logged on this date for the night before.
    pub prev_day_sleep_marker: Option<DateTime<Utc>>,
    pub first_event_start: DateTime<Utc>,
    pub last_event_end: DateTime<Utc>,
    /// Most frequent zone among the day's events; first seen wins ties.
    pub primary_zone: EventZone,
    /// Zones in first-seen order with their event counts.
    pub zone_counts: Vec<(EventZone, usize)>,
}

impl DayAggregate {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, zone: EventZone) -> Self {
        Self {
            wakeup_marker: None,
            sleep_marker: None,
            prev_day_sleep_marker: None,
            first_event_start: start,
            last_event_end: end,
            primary_zone: zone,
            zone_counts: Vec::new(),
        }
    }

    fn count_zone(&mut self, zone: EventZone) {
        match self.zone_counts.iter_mut().find(|(z, _)| *z == zone) {
            Some((_, count)) => *count += 1,
            None => self.zone_counts.push((zone, 1)),
        }
    }

    fn settle_primary_zone(&mut self) {
        let mut best: Option<(EventZone, usize)> = None;
        for &(zone, count) in &self.zone_counts {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((zone, count));
            }
        }
        if let Some((zone, _)) = best {
            self.primary_zone = zone;
        }
    }

    fn at(&self, instant: DateTime<Utc>) -> Zoned {
        Zoned {
            instant,
            zone: self.primary_zone,
        }
    }
}

/// An instant paired with the zone its wall-clock time is read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Zoned {
    instant: DateTime<Utc>,
    zone: EventZone,
}

impl Zoned {
    fn earlier(self, other: Self) -> Self {
        if other.instant < self.instant {
            other
        } else {
            self
        }
    }

    fn later(self, other: Self) -> Self {
        if other.instant > self.instant {
            other
        } else {
            self
        }
    }
}

/// Compiled sleep inference settings.
#[derive(Debug, Clone)]
pub struct SleepInference {
    start_marker: Regex,
    end_marker: Regex,
    daily_sleep: Duration,
    post_midnight_hour: u32,
}

impl SleepInference {
    /// Compiles `prefs`, or returns `None` when either marker is missing.
    pub fn from_preferences(prefs: &SleepPreferences) -> Result<Option<Self>, SleepError> {
        let (Some(start), Some(end)) = (prefs.start_marker.as_deref(), prefs.end_marker.as_deref())
        else {
            return Ok(None);
        };
        if !prefs.has_markers() {
            return Ok(None);
        }
        let compile = |which, pattern: &str| {
            compile_prefix(pattern).map_err(|source| SleepError::InvalidMarker {
                which,
                pattern: pattern.to_string(),
                source,
            })
        };
        Ok(Some(Self {
            start_marker: compile("start", start)?,
            end_marker: compile("end", end)?,
            daily_sleep: prefs.daily_sleep()?,
            post_midnight_hour: prefs.post_midnight_hour,
        }))
    }

    /// Builds the per-date aggregates for `events`.
    ///
    /// Events without timed boundaries are ignored. Dates are taken from each
    /// event's own start offset.
    pub fn day_aggregates(&self, events: &[Event]) -> BTreeMap<NaiveDate, DayAggregate> {
        let mut days: BTreeMap<NaiveDate, DayAggregate> = BTreeMap::new();
        let mut late_markers: Vec<(NaiveDate, DateTime<Utc>)> = Vec::new();

        for event in events {
            let (Some((start, end)), Some(zone)) = (event.span(), event.zone()) else {
                continue;
            };
            let start_utc = start.to_utc();
            let end_utc = end.to_utc();
            let day = days
                .entry(start.date_naive())
                .or_insert_with(|| DayAggregate::new(start_utc, end_utc, zone));
            day.count_zone(zone);

            let summary = event.summary.trim();
            let local_start = zone.local(start_utc);
            if self.end_marker.is_match(summary) {
                day.wakeup_marker = Some(start_utc);
            } else if self.start_marker.is_match(summary) {
                if local_start.hour() < self.post_midnight_hour {
                    day.prev_day_sleep_marker = Some(end_utc);
                    late_markers.push((local_start.date() - Duration::days(1), end_utc));
                } else {
                    day.sleep_marker = Some(end_utc);
                }
            }

            day.first_event_start = day.first_event_start.min(start_utc);
            day.last_event_end = day.last_event_end.max(end_utc);
        }

        for (date, marker) in late_markers {
            if let Some(day) = days.get_mut(&date) {
                day.sleep_marker = Some(marker);
            }
        }
        for day in days.values_mut() {
            day.settle_primary_zone();
        }
        days
    }

    /// Imputes sleep events for `events`. The input is not modified.
    ///
    /// `today` suppresses the trailing sleep interval when the last day with
    /// events is still in progress.
    pub fn infer(&self, events: &[Event], today: NaiveDate) -> Result<Vec<Event>, SleepError> {
        let days = self.day_aggregates(events);
        let dates: Vec<NaiveDate> = days.keys().copied().collect();
        let mut sleep = Vec::new();

        for pair in dates.windows(2) {
            let (Some(day0), Some(day1)) = (days.get(&pair[0]), days.get(&pair[1])) else {
                continue;
            };
            sleep.extend(self.night_between(pair[0], day0, day1)?);
        }

        if let Some((_, first)) = days.first_key_value() {
            sleep.extend(first_day_sleep(first)?);
        }
        if let Some((&date, last)) = days.last_key_value() {
            if date != today {
                sleep.extend(last_day_sleep(last)?);
            }
        }

        tracing::debug!(days = dates.len(), events = sleep.len(), "imputed sleep events");
        Ok(sleep)
    }

    fn night_between(
        &self,
        date0: NaiveDate,
        day0: &DayAggregate,
        day1: &DayAggregate,
    ) -> Result<Vec<Event>, SleepError> {
        let first1 = day1.at(day1.first_event_start);
        let last0 = day0.at(day0.last_event_end);

        match (day0.sleep_marker, day1.wakeup_marker) {
            (Some(asleep), Some(awake)) => sleep_span(day0.at(asleep), day1.at(awake)),
            (Some(asleep), None) => {
                let start = day0.at(asleep);
                let end = day0.at(asleep + self.daily_sleep).earlier(first1);
                sleep_span(start, end)
            }
            (None, Some(awake)) => {
                let end = day1.at(awake);
                let start = day1.at(awake - self.daily_sleep).later(last0);
                sleep_span(start, end)
            }
            (None, None) => {
                let night = date0.and_time(NIGHT_START);
                let start = last0.later(day0.at(day0.primary_zone.resolve(night)));
                let end = day0.at(start.instant + self.daily_sleep).earlier(first1);
                sleep_span(start, end)
            }
        }
    }
}

fn first_day_sleep(day: &DayAggregate) -> Result<Vec<Event>, SleepError> {
    let first = day.at(day.first_event_start);
    let start = match day.prev_day_sleep_marker {
        Some(marker) => day.at(marker),
        None => day.at(midnight_of(first)),
    };
    let end = day.wakeup_marker.map_or(first, |marker| day.at(marker));
    sleep_span(start, end)
}

fn last_day_sleep(day: &DayAggregate) -> Result<Vec<Event>, SleepError> {
    if let Some(marker) = day.sleep_marker {
        let start = day.at(marker);
        return sleep_span(start, day.at(next_local_midnight(start)));
    }
    let midnight = next_local_midnight(day.at(day.first_event_start));
    if day.last_event_end < midnight {
        return sleep_span(day.at(day.last_event_end), day.at(midnight));
    }
    Ok(Vec::new())
}

fn midnight_of(time: Zoned) -> DateTime<Utc> {
    let date = time.zone.local(time.instant).date();
    time.zone.resolve(date.and_time(NaiveTime::MIN))
}

fn next_local_midnight(time: Zoned) -> DateTime<Utc> {
    let date = time.zone.local(time.instant).date() + Duration::days(1);
    time.zone.resolve(date.and_time(NaiveTime::MIN))
}

/// Builds sleep events over `[start, end)`, split at local midnight.
fn sleep_span(start: Zoned, end: Zoned) -> Result<Vec<Event>, SleepError> {
    if start.zone != end.zone {
        return Err(SleepError::TimezoneMismatch {
            start: start.zone.to_string(),
            end: end.zone.to_string(),
        });
    }
    let zone = start.zone;
    let start_date = zone.local(start.instant).date();
    let end_date = zone.local(end.instant).date();

    let parts = if start_date == end_date {
        vec![(start.instant, end.instant)]
    } else {
        let midnight = next_local_midnight(start);
        vec![(start.instant, midnight), (midnight, end.instant)]
    };

    Ok(parts
        .into_iter()
        .filter(|(from, to)| floor_minutes(*to - *from) > 0.0)
        .map(|(from, to)| {
            Event::synthetic(
                EventOrigin::Sleep,
                SLEEP_SUMMARY,
                zone.fixed(from),
                zone.fixed(to),
                zone.name(),
            )
        })
        .collect())
}
