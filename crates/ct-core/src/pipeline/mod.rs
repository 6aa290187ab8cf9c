//! Normalization of fetched events into a gap-free, classified timeline.
//!
//! # Stages
//!
//! 1. Drop all-day events
//! 2. Keep allowed event types
//! 3. Annotate whole-minute durations
//! 4. Split events running past midnight
//! 5. Clip to `min(range end, now)`
//! 6. Clip to the range start
//! 7. Sort by start, longest first on ties
//! 8. Impute sleep
//! 9. Redistribute overlapping time
//! 10. Fill untracked time for past dates
//! 11. Classify against the rule table
//!
//! The pipeline works on its own copy of the input.

mod clip;
mod filters;
mod gaps;
mod overlap;
mod split;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::event::Event;
use crate::event_type::EventType;
use crate::range::DateRange;
use crate::rules::{ClassificationWarning, RuleTable, check_classification};
use crate::sleep::{SleepError, SleepInference, SleepPreferences};

pub use clip::{clip_future, clip_past};
pub use filters::{drop_all_day, keep_event_types};
pub use gaps::{MINUTES_PER_DAY, fill_gaps, untracked_summary};
pub use overlap::{redistribute, sort_events};
pub use split::{annotate_durations, split_overnight};

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Sleep imputation was required but a marker pattern is missing.
    #[error("sleep imputation requires both start and end marker patterns")]
    SleepMarkersMissing,
    /// Sleep imputation failed.
    #[error(transparent)]
    Sleep(#[from] SleepError),
}

/// Everything a pipeline run depends on.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub range: DateRange,
    pub now: DateTime<Utc>,
    /// Local date treated as in progress: no untracked fill, no trailing sleep.
    pub today: NaiveDate,
    pub event_types: Vec<EventType>,
    pub sleep: SleepPreferences,
    /// Fail instead of skipping sleep imputation when markers are missing.
    pub require_sleep: bool,
    pub rules: RuleTable,
}

impl NormalizeOptions {
    /// Options with the default event types, no sleep markers and no rules.
    pub fn new(range: DateRange, now: DateTime<Utc>, today: NaiveDate) -> Self {
        Self {
            range,
            now,
            today,
            event_types: EventType::TRACKED.to_vec(),
            sleep: SleepPreferences::default(),
            require_sleep: false,
            rules: RuleTable::default(),
        }
    }
}

/// Output of a pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedTimeline {
    pub events: Vec<Event>,
    pub warnings: Vec<ClassificationWarning>,
}

/// Runs every stage over a copy of `events`.
pub fn normalize(
    events: &[Event],
    options: &NormalizeOptions,
) -> Result<NormalizedTimeline, PipelineError> {
    let sleep = SleepInference::from_preferences(&options.sleep)?;
    if sleep.is_none() && options.require_sleep {
        return Err(PipelineError::SleepMarkersMissing);
    }

    let events = drop_all_day(events.to_vec());
    let events = keep_event_types(events, &options.event_types);
    let events = annotate_durations(events);
    let events = split_overnight(events);

    let boundary = options.range.to().min(options.now.fixed_offset());
    let events = clip_future(events, boundary);
    let mut events = clip_past(events, options.range.from());
    sort_events(&mut events);
    tracing::debug!(count = events.len(), "events after clipping");

    match &sleep {
        Some(inference) => {
            let imputed = inference.infer(&events, options.today)?;
            events.extend(imputed);
            sort_events(&mut events);
        }
        None => tracing::debug!("sleep markers not configured, skipping sleep imputation"),
    }

    redistribute(&mut events);

    let mut events = fill_gaps(events, options.today);
    sort_events(&mut events);

    let warnings = classify(&mut events, &options.rules);
    Ok(NormalizedTimeline { events, warnings })
}

/// Attaches categories to every event and returns the anomalies found.
pub fn classify(events: &mut [Event], rules: &RuleTable) -> Vec<ClassificationWarning> {
    let mut warnings = Vec::new();
    for event in events.iter_mut() {
        event.categories = rules.classify(event);
        if let Some(warning) = check_classification(event) {
            tracing::warn!(id = %event.id, "{warning}");
            warnings.push(warning);
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, TimeZone};

    use crate::event::EventOrigin;
    use crate::types::EventId;

    fn at(s: &str) -> DateTime<chrono::FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn ev(id: &str, summary: &str, start: &str, end: &str) -> Event {
        Event::timed(
            EventId::new(id).unwrap(),
            summary,
            at(start),
            at(end),
            Some("UTC".into()),
        )
    }

    fn options(from: u32, to: u32) -> NormalizeOptions {
        let utc = FixedOffset::east_opt(0).unwrap();
        NormalizeOptions::new(
            DateRange::days(date(from), date(to), utc).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).single().unwrap(),
            date(10),
        )
    }

    const RULES: &str = r#"{
        "work": {"title": "Work", "patterns": [{"regex": "Work"}]},
        "sleep": {"title": "Sleep", "patterns": [{"regex": "Sleeping"}]},
        "untracked": {"title": "Untracked", "patterns": [{"regex": "Untracked"}]}
    }"#;

    #[test]
    fn single_past_event_is_padded_to_a_full_day() {
        let events = vec![ev("a", "Work", "2024-01-01T08:00:00Z", "2024-01-01T18:00:00Z")];
        let timeline = normalize(&events, &options(1, 1)).unwrap();

        assert_eq!(timeline.events.len(), 2);
        let total: f64 = timeline.events.iter().map(|e| e.duration_minutes).sum();
        assert!((total - MINUTES_PER_DAY).abs() < 1e-9);
        assert_eq!(timeline.events[0].origin, EventOrigin::Untracked);
        assert_eq!(timeline.events[0].summary, "Untracked (840 min)");
    }

    #[test]
    fn input_is_not_mutated() {
        let events = vec![ev("a", "Work", "2024-01-01T23:00:00Z", "2024-01-02T01:00:00Z")];
        let before = events.clone();
        let timeline = normalize(&events, &options(1, 2)).unwrap();
        assert_eq!(events, before);
        let parts = timeline.events.iter().filter(|e| e.id.as_str() == "a").count();
        assert_eq!(parts, 2);
    }

    #[test]
    fn overlapping_events_share_time() {
        let events = vec![
            ev("a", "Work A", "2024-01-01T09:00:00Z", "2024-01-01T10:00:00Z"),
            ev("b", "Work B", "2024-01-01T09:30:00Z", "2024-01-01T10:30:00Z"),
        ];
        let timeline = normalize(&events, &options(1, 1)).unwrap();
        let a = timeline.events.iter().find(|e| e.id.as_str() == "a").unwrap();
        let b = timeline.events.iter().find(|e| e.id.as_str() == "b").unwrap();
        assert!((a.duration_minutes - 45.0).abs() < 1e-9);
        assert!((b.duration_minutes - 45.0).abs() < 1e-9);
    }

    #[test]
    fn future_and_excluded_events_are_removed() {
        let mut focus = ev("focus", "Focus", "2024-01-10T08:00:00Z", "2024-01-10T09:00:00Z");
        focus.event_type = EventType::FocusTime;
        let events = vec![
            focus,
            ev("future", "Work", "2024-01-10T13:00:00Z", "2024-01-10T14:00:00Z"),
            ev("now", "Work", "2024-01-10T11:00:00Z", "2024-01-10T13:00:00Z"),
        ];
        let timeline = normalize(&events, &options(10, 10)).unwrap();
        let ids: Vec<_> = timeline.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["now"]);
    }

    #[test]
    fn sleep_is_imputed_and_classified() {
        let mut opts = options(1, 2);
        opts.sleep = SleepPreferences {
            start_marker: Some("Bed".into()),
            end_marker: Some("Wake".into()),
            ..SleepPreferences::default()
        };
        opts.rules = RuleTable::from_json(RULES).unwrap();
        let events = vec![
            ev("a", "Work", "2024-01-01T09:00:00Z", "2024-01-01T17:00:00Z"),
            ev("b", "Work", "2024-01-02T09:00:00Z", "2024-01-02T17:00:00Z"),
        ];

        let timeline = normalize(&events, &opts).unwrap();

        let sleep: f64 = timeline
            .events
            .iter()
            .filter(|e| e.origin == EventOrigin::Sleep)
            .map(|e| e.duration_minutes)
            .sum();
        // First morning 9h, one night 8h, last evening 7h.
        assert!((sleep - 24.0 * 60.0).abs() < 1e-9);
        assert!(
            timeline
                .events
                .iter()
                .filter(|e| e.origin == EventOrigin::Sleep)
                .all(|e| e.categories[0].path == "sleep")
        );
        assert!(timeline.warnings.is_empty(), "{:?}", timeline.warnings);
    }

    #[test]
    fn required_sleep_without_markers_fails() {
        let mut opts = options(1, 1);
        opts.require_sleep = true;
        assert!(matches!(
            normalize(&[], &opts),
            Err(PipelineError::SleepMarkersMissing)
        ));
    }

    #[test]
    fn unclassified_events_are_reported() {
        let mut opts = options(1, 1);
        opts.rules = RuleTable::from_json(RULES).unwrap();
        let events = vec![ev("a", "Lunch", "2024-01-01T12:00:00Z", "2024-01-01T13:00:00Z")];

        let timeline = normalize(&events, &opts).unwrap();
        assert_eq!(timeline.warnings.len(), 1);
        assert!(matches!(
            &timeline.warnings[0],
            ClassificationWarning::Unclassified { summary, .. } if summary == "Lunch"
        ));
    }
}
