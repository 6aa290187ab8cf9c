//! Range projection over a freshly reconciled cache.

use crate::cache::{CacheKey, CacheStore, SyncCache};
use crate::event::{Event, EventTime};
use crate::range::DateRange;
use crate::source::EventSource;
use crate::sync::{Reconciler, SyncError};

/// Events in `cache` that overlap `range`, stamped with the cache's ids.
///
/// Timed events qualify when their start falls in the range. All-day events
/// qualify when either their start or end date falls in the date-only
/// projection of the range. Returned events are owned copies; mutating them
/// never touches the cache.
pub fn project(cache: &SyncCache, range: &DateRange) -> Vec<Event> {
    cache
        .events
        .iter()
        .filter(|event| overlaps(event, range))
        .map(|event| {
            let mut event = event.clone();
            event.calendar_id = Some(cache.calendar_id.clone());
            event.account_id = Some(cache.account_id.clone());
            event
        })
        .collect()
}

fn overlaps(event: &Event, range: &DateRange) -> bool {
    match &event.start {
        Some(EventTime::Timed { date_time, .. }) => range.contains(*date_time),
        Some(EventTime::AllDay { date }) => {
            range.contains_date(*date)
                || event
                    .end
                    .as_ref()
                    .is_some_and(|end| range.contains_date(end.date()))
        }
        None => false,
    }
}

impl<S: EventSource, C: CacheStore> Reconciler<S, C> {
    /// Syncs the calendar, then returns its events overlapping `range`.
    pub fn fetch_events(&self, key: &CacheKey, range: &DateRange) -> Result<Vec<Event>, SyncError> {
        let outcome = self.sync(key)?;
        let events = project(&outcome.cache, range);
        tracing::debug!(key = %key, count = events.len(), "projected events in range");
        Ok(events)
    }
}
