//! Untracked-time placeholders.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};

use crate::event::{Event, EventOrigin};

/// Minutes in a day.
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Summary of the placeholder for `minutes` of untracked time.
pub fn untracked_summary(minutes: f64) -> String {
    format!("Untracked ({minutes:.0} min)")
}

/// Appends one untracked event per past date whose durations fall short of a
/// full day.
///
/// Dates come from each event's start. `today` is never filled since it is
/// still in progress. The placeholder spans `[00:00, 00:00 + remainder)` UTC
/// and carries the remainder as its duration.
pub fn fill_gaps(mut events: Vec<Event>, today: NaiveDate) -> Vec<Event> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for event in &events {
        let Some(date) = event.start_date() else {
            continue;
        };
        let total = totals.entry(date).or_default();
        if event.duration_minutes > 0.0 {
            *total += event.duration_minutes;
        }
    }

    for (date, total) in totals {
        let remainder = MINUTES_PER_DAY - total;
        if date == today || remainder <= 0.0 {
            continue;
        }
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + seconds(remainder);
        let mut untracked = Event::synthetic(
            EventOrigin::Untracked,
            untracked_summary(remainder),
            start.fixed_offset(),
            end.fixed_offset(),
            Some(Utc.to_string()),
        );
        untracked.duration_minutes = remainder;
        tracing::debug!(%date, minutes = remainder, "filled untracked time");
        events.push(untracked);
    }
    events
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "a remainder is at most one day of seconds"
)]
fn seconds(minutes: f64) -> Duration {
    Duration::seconds((minutes * 60.0).round() as i64)
}
