//! Gathering and normalizing events for the timeline commands.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use ct_core::{
    CacheKey, CacheStore, DatePreset, DateRange, Event, EventSource, NormalizeOptions,
    NormalizedTimeline, Reconciler, normalize, project,
};

use crate::cli::RangeArgs;
use crate::config::Config;
use crate::preferences::Preferences;

/// The wall clock a command runs against.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
    pub offset: FixedOffset,
}

impl Clock {
    /// The system clock in the local timezone.
    pub fn local() -> Self {
        let now = chrono::Local::now();
        Self {
            now: now.with_timezone(&Utc),
            today: now.date_naive(),
            offset: *now.offset(),
        }
    }
}

/// Resolves range arguments to whole local days. Defaults to today.
pub fn resolve_range(args: &RangeArgs, clock: &Clock) -> Result<DateRange> {
    let range = match (args.preset, args.from, args.to) {
        (_, Some(from), Some(to)) => DateRange::days(from, to, clock.offset),
        (Some(preset), _, _) => preset.range(clock.today, clock.offset),
        _ => DatePreset::Today.range(clock.today, clock.offset),
    };
    range.context("invalid date range")
}

/// Events in `range` from stored caches, without contacting the remote.
///
/// With no calendars configured, every stored cache is used.
pub fn cached_events<C: CacheStore>(
    store: &C,
    keys: &[CacheKey],
    range: &DateRange,
) -> Result<Vec<Event>> {
    let caches = if keys.is_empty() {
        store.list().context("failed to list sync caches")?
    } else {
        let mut caches = Vec::with_capacity(keys.len());
        for key in keys {
            match store
                .load(key)
                .with_context(|| format!("failed to load cache for {key}"))?
            {
                Some(cache) => caches.push(cache),
                None => tracing::warn!(key = %key, "calendar has not been synced yet"),
            }
        }
        caches
    };

    Ok(caches
        .iter()
        .flat_map(|cache| project(cache, range))
        .collect())
}

/// Syncs every calendar, then returns their events in `range`.
///
/// A single calendar is fetched directly, without the worker pool.
pub fn synced_events<S: EventSource, C: CacheStore>(
    reconciler: &Reconciler<S, C>,
    keys: &[CacheKey],
    range: &DateRange,
) -> Result<Vec<Event>> {
    if let [key] = keys {
        return reconciler
            .fetch_events(key, range)
            .with_context(|| format!("failed to sync {key}"));
    }

    let results = reconciler
        .sync_all(keys)
        .context("failed to start sync workers")?;

    let mut events = Vec::new();
    for (key, result) in results {
        let outcome = result.with_context(|| format!("failed to sync {key}"))?;
        events.extend(project(&outcome.cache, range));
    }
    Ok(events)
}

/// Runs the normalization pipeline with configured types and preferences.
pub fn normalize_events(
    events: &[Event],
    range: DateRange,
    clock: &Clock,
    config: &Config,
    preferences: &Preferences,
) -> Result<NormalizedTimeline> {
    let options = NormalizeOptions {
        event_types: config.event_types.clone(),
        sleep: preferences.sleep.clone(),
        rules: preferences.categories.clone(),
        ..NormalizeOptions::new(range, clock.now, clock.today)
    };
    normalize(events, &options).context("failed to normalize events")
}
