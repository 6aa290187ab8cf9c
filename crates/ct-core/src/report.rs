//! Aggregations over a normalized timeline.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate, Timelike, Weekday};
use serde::Serialize;

use crate::event::{Event, EventOrigin, exact_minutes};

const MINUTES_PER_HOUR: f64 = 60.0;

/// Top-level category an event is charged to: that of its first match.
fn charged_category(event: &Event) -> Option<&str> {
    event.categories.first().map(|c| c.top_level())
}

/// Hours per top-level category. Unclassified events are skipped.
pub fn category_totals(events: &[Event]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for event in events {
        if let Some(category) = charged_category(event) {
            *totals.entry(category.to_string()).or_default() +=
                event.duration_minutes / MINUTES_PER_HOUR;
        }
    }
    totals
}

/// Hours per top-level category for each start date.
pub fn daily_category_totals(events: &[Event]) -> BTreeMap<NaiveDate, BTreeMap<String, f64>> {
    let mut days: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
    for event in events {
        let (Some(date), Some(category)) = (event.start_date(), charged_category(event)) else {
            continue;
        };
        *days
            .entry(date)
            .or_default()
            .entry(category.to_string())
            .or_default() += event.duration_minutes / MINUTES_PER_HOUR;
    }
    days
}

/// Hours split into productive, other, sleep and untracked time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProductivityBreakdown {
    pub productive: f64,
    pub other: f64,
    pub sleep: f64,
    pub untracked: f64,
}

impl ProductivityBreakdown {
    pub fn total(&self) -> f64 {
        self.productive + self.other + self.sleep + self.untracked
    }
}

/// Buckets events by origin, then by whether any of their categories (full
/// path or top level) is listed in `productive`.
pub fn productivity_breakdown(events: &[Event], productive: &[String]) -> ProductivityBreakdown {
    let is_productive = |event: &Event| {
        event.categories.iter().any(|c| {
            productive
                .iter()
                .any(|p| p == &c.path || p == c.top_level())
        })
    };

    let mut breakdown = ProductivityBreakdown::default();
    for event in events {
        let hours = event.duration_minutes / MINUTES_PER_HOUR;
        let bucket = match event.origin {
            EventOrigin::Sleep => &mut breakdown.sleep,
            EventOrigin::Untracked => &mut breakdown.untracked,
            EventOrigin::Remote if is_productive(event) => &mut breakdown.productive,
            EventOrigin::Remote => &mut breakdown.other,
        };
        *bucket += hours;
    }
    breakdown
}

/// Average hours per weekday and hour of day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayHourProfile {
    /// `hours[weekday][hour]`, Monday first.
    pub hours: [[f64; 24]; 7],
    /// Distinct ISO weeks the events start in.
    pub weeks: usize,
}

impl WeekdayHourProfile {
    pub fn get(&self, weekday: Weekday, hour: u32) -> f64 {
        self.hours[weekday.num_days_from_monday() as usize][hour as usize]
    }
}

/// Spreads each event's wall-clock span over the hours it touches, read in
/// the start's offset, then averages over the number of distinct ISO weeks.
pub fn hourly_weekday_profile(events: &[Event]) -> WeekdayHourProfile {
    let mut hours = [[0.0_f64; 24]; 7];
    let mut weeks = BTreeSet::new();

    for (start, end) in events.iter().filter_map(Event::span) {
        let iso = start.iso_week();
        weeks.insert((iso.year(), iso.week()));

        let mut cursor = start;
        let end = end.with_timezone(start.offset());
        while cursor < end {
            let into_hour = Duration::seconds(i64::from(cursor.minute() * 60 + cursor.second()))
                + Duration::nanoseconds(i64::from(cursor.nanosecond()));
            let segment_end = (cursor - into_hour + Duration::hours(1)).min(end);
            let day = cursor.weekday().num_days_from_monday() as usize;
            hours[day][cursor.hour() as usize] += exact_minutes(segment_end - cursor) / MINUTES_PER_HOUR;
            cursor = segment_end;
        }
    }

    if !weeks.is_empty() {
        #[expect(clippy::cast_precision_loss, reason = "week counts are tiny")]
        let divisor = weeks.len() as f64;
        for cell in hours.iter_mut().flatten() {
            *cell /= divisor;
        }
    }

    WeekdayHourProfile {
        hours,
        weeks: weeks.len(),
    }
}
