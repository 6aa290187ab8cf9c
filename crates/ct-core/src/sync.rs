//! Incremental reconciliation of sync caches against a remote calendar.
//!
//! # Algorithm
//!
//! 1. Load the stored cache for the (account, calendar) key, or start empty
//! 2. Request pages of changes, passing the stored continuation token when one
//!    exists and asking for deletion markers
//! 3. Merge every item: `cancelled` removes, a known id replaces, an unknown
//!    id appends
//! 4. After the last page, persist the new token, the merged events and the
//!    pass timestamp in a single save
//!
//! A rejected continuation token discards the stored cache and runs one fresh
//! full pass. A failure during that pass propagates.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use thiserror::Error;

use crate::cache::{CacheKey, CacheStore, StoreError, SyncCache};
use crate::event::{Event, EventStatus};
use crate::source::{EventSource, ListRequest, SourceError};
use crate::types::EventId;

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The cache store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The parallel worker pool could not be started.
    #[error("failed to build sync worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for reconciliation.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Items requested per page. Default: 500.
    pub page_size: u32,
    /// Calendars reconciled concurrently by [`Reconciler::sync_all`]. Default: 10.
    pub workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            workers: 10,
        }
    }
}

/// Merge counts for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncStats {
    /// Change in cache size produced by the pass.
    #[expect(
        clippy::cast_possible_wrap,
        reason = "event counts stay far below isize::MAX"
    )]
    pub const fn size_delta(&self) -> isize {
        self.added as isize - self.deleted as isize
    }
}

/// Result of reconciling one calendar.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The cache as persisted at the end of the pass.
    pub cache: SyncCache,
    pub stats: SyncStats,
    /// Whether the stored token was rejected and the cache rebuilt from scratch.
    pub full_resync: bool,
}

/// Applies remote items to a cached event list, preserving insertion order.
///
/// Removed events leave an empty slot so positions stay valid until
/// [`EventMerge::finish`] compacts the list.
#[derive(Debug, Default)]
pub struct EventMerge {
    slots: Vec<Option<Event>>,
    positions: HashMap<EventId, usize>,
    stats: SyncStats,
}

impl EventMerge {
    /// Starts a merge over the currently cached events.
    pub fn new(events: Vec<Event>) -> Self {
        let mut merge = Self::default();
        for event in events {
            if let Some(&pos) = merge.positions.get(&event.id) {
                merge.slots[pos] = Some(event);
            } else {
                merge.positions.insert(event.id.clone(), merge.slots.len());
                merge.slots.push(Some(event));
            }
        }
        merge
    }

    /// Applies one remote item.
    pub fn apply(&mut self, item: Event) {
        if item.status == EventStatus::Cancelled {
            if let Some(pos) = self.positions.remove(&item.id) {
                self.slots[pos] = None;
                self.stats.deleted += 1;
            }
        } else if let Some(&pos) = self.positions.get(&item.id) {
            self.slots[pos] = Some(item);
            self.stats.updated += 1;
        } else {
            self.positions.insert(item.id.clone(), self.slots.len());
            self.slots.push(Some(item));
            self.stats.added += 1;
        }
    }

    /// Returns the merged events and the counts accumulated so far.
    pub fn finish(self) -> (Vec<Event>, SyncStats) {
        (self.slots.into_iter().flatten().collect(), self.stats)
    }
}

/// Merges `items` into `events` in one step.
pub fn merge_items(events: Vec<Event>, items: impl IntoIterator<Item = Event>) -> (Vec<Event>, SyncStats) {
    let mut merge = EventMerge::new(events);
    for item in items {
        merge.apply(item);
    }
    merge.finish()
}

/// Drives paginated fetch-and-merge passes against a remote source.
#[derive(Debug)]
pub struct Reconciler<S, C> {
    source: S,
    store: C,
    config: SyncConfig,
}

impl<S: EventSource, C: CacheStore> Reconciler<S, C> {
    pub const fn new(source: S, store: C, config: SyncConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    pub const fn store(&self) -> &C {
        &self.store
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Brings the cache for `key` up to date with the remote calendar.
    pub fn sync(&self, key: &CacheKey) -> Result<SyncOutcome, SyncError> {
        self.sync_at(key, Utc::now())
    }

    /// Like [`Reconciler::sync`], stamping the cache with `now`.
    pub fn sync_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<SyncOutcome, SyncError> {
        match self.run_pass(key, now) {
            Err(SyncError::Source(err)) if err.is_token_invalid() => {
                tracing::warn!(
                    key = %key,
                    error = %err,
                    "continuation token rejected, performing full sync"
                );
                self.store.delete(key)?;
                let mut outcome = self.run_pass(key, now)?;
                outcome.full_resync = true;
                Ok(outcome)
            }
            result => result,
        }
    }

    /// Reconciles several calendars on a bounded worker pool.
    ///
    /// Duplicate keys are dropped so no cache is ever reconciled by two
    /// workers at once. Results come back in first-occurrence order.
    pub fn sync_all(
        &self,
        keys: &[CacheKey],
    ) -> Result<Vec<(CacheKey, Result<SyncOutcome, SyncError>)>, SyncError> {
        let mut seen = HashSet::new();
        let unique: Vec<CacheKey> = keys
            .iter()
            .filter(|key| seen.insert(*key))
            .cloned()
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build()?;

        Ok(pool.install(|| {
            unique
                .into_par_iter()
                .map(|key| {
                    let result = self.sync(&key);
                    (key, result)
                })
                .collect()
        }))
    }

    fn run_pass(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<SyncOutcome, SyncError> {
        let cache = self
            .store
            .load(key)?
            .unwrap_or_else(|| SyncCache::empty(key, now));
        let token = cache.has_token().then(|| cache.continuation_token.clone());

        let mut merge = EventMerge::new(cache.events);
        let mut cursor: Option<String> = None;

        let next_token = loop {
            let request = ListRequest {
                account_id: &key.account_id,
                calendar_id: &key.calendar_id,
                continuation_token: token.as_deref(),
                page_cursor: cursor.as_deref(),
                max_results: self.config.page_size,
                include_deleted: true,
            };
            let page = self.source.list_events(&request)?;
            tracing::debug!(key = %key, items = page.items.len(), "fetched page");

            for item in page.items {
                merge.apply(item);
            }

            match page.next_page_cursor {
                Some(next) => cursor = Some(next),
                None => break page.next_continuation_token,
            }
        };

        let continuation_token = next_token.unwrap_or_else(|| {
            tracing::warn!(
                key = %key,
                "final page carried no continuation token, next sync will be a full listing"
            );
            String::new()
        });

        let (events, stats) = merge.finish();
        let cache = SyncCache {
            continuation_token,
            events,
            calendar_id: key.calendar_id.clone(),
            account_id: key.account_id.clone(),
            last_sync_time: now,
        };
        self.store.save(&cache)?;

        tracing::info!(
            key = %key,
            added = stats.added,
            updated = stats.updated,
            deleted = stats.deleted,
            "sync completed"
        );

        Ok(SyncOutcome {
            cache,
            stats,
            full_resync: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use crate::cache::MemoryStore;
    use crate::event::EventStatus;
    use crate::source::EventPage;
    use crate::types::{AccountId, CalendarId};

    /// A scripted remote: each call pops the next canned response and records
    /// the token and cursor it was called with.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<EventPage, SourceError>>>,
        calls: Mutex<Vec<(Option<String>, Option<String>)>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<EventPage, SourceError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> Vec<(Option<String>, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl EventSource for ScriptedSource {
        fn list_events(&self, request: &ListRequest<'_>) -> Result<EventPage, SourceError> {
            assert!(request.include_deleted);
            self.calls.lock().unwrap().push((
                request.continuation_token.map(String::from),
                request.page_cursor.map(String::from),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra request")
        }
    }

    fn key() -> CacheKey {
        CacheKey::new(
            AccountId::new("me@example.com").unwrap(),
            CalendarId::new("primary").unwrap(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).single().unwrap()
    }

    fn item(id: &str, summary: &str) -> Event {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "status": "confirmed",
            "summary": summary,
            "start": {"dateTime": "2024-01-02T09:00:00Z"},
            "end": {"dateTime": "2024-01-02T10:00:00Z"},
        }))
        .unwrap()
    }

    fn cancelled(id: &str) -> Event {
        serde_json::from_value(serde_json::json!({"id": id, "status": "cancelled"})).unwrap()
    }

    fn last_page(items: Vec<Event>, token: &str) -> Result<EventPage, SourceError> {
        Ok(EventPage {
            items,
            next_page_cursor: None,
            next_continuation_token: Some(token.to_string()),
        })
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn merge_adds_updates_and_deletes() {
        let cached = vec![item("a", "A"), item("b", "B")];
        let (events, stats) = merge_items(
            cached,
            vec![item("b", "B2"), cancelled("a"), item("c", "C"), cancelled("zzz")],
        );
        assert_eq!(ids(&events), vec!["b", "c"]);
        assert_eq!(events[0].summary, "B2");
        assert_eq!(
            stats,
            SyncStats {
                added: 1,
                updated: 1,
                deleted: 1
            }
        );
        assert_eq!(stats.size_delta(), 0);
    }

    #[test]
    fn merge_is_idempotent() {
        let page = vec![item("a", "A"), cancelled("b"), item("c", "C")];
        let (once, _) = merge_items(vec![item("b", "B")], page.clone());
        let (twice, stats) = merge_items(once.clone(), page);
        assert_eq!(once, twice);
        assert_eq!(stats.added, 0);
        assert_eq!(stats.deleted, 0);
    }

    #[test]
    fn deleted_then_readded_in_one_pass_appends() {
        let (events, stats) = merge_items(
            vec![item("a", "A"), item("b", "B")],
            vec![cancelled("a"), item("a", "A again")],
        );
        assert_eq!(ids(&events), vec!["b", "a"]);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.added, 1);
    }

    #[test]
    fn first_sync_walks_pages_and_stores_token() {
        let source = ScriptedSource::new(vec![
            Ok(EventPage {
                items: vec![item("a", "A")],
                next_page_cursor: Some("page-2".into()),
                next_continuation_token: None,
            }),
            last_page(vec![item("b", "B")], "token-1"),
        ]);
        let reconciler = Reconciler::new(&source, MemoryStore::new(), SyncConfig::default());

        let outcome = reconciler.sync_at(&key(), now()).unwrap();

        assert_eq!(ids(&outcome.cache.events), vec!["a", "b"]);
        assert_eq!(outcome.cache.continuation_token, "token-1");
        assert_eq!(outcome.cache.last_sync_time, now());
        assert_eq!(outcome.stats.added, 2);
        assert!(!outcome.full_resync);
        assert_eq!(
            source.calls(),
            vec![(None, None), (None, Some("page-2".to_string()))]
        );
        let stored = reconciler.store().load(&key()).unwrap().unwrap();
        assert_eq!(stored, outcome.cache);
    }

    #[test]
    fn incremental_sync_passes_stored_token() {
        let source = ScriptedSource::new(vec![
            last_page(vec![item("a", "A"), item("b", "B")], "token-1"),
            last_page(vec![cancelled("a"), item("b", "B2")], "token-2"),
        ]);
        let reconciler = Reconciler::new(&source, MemoryStore::new(), SyncConfig::default());

        reconciler.sync_at(&key(), now()).unwrap();
        let outcome = reconciler.sync_at(&key(), now()).unwrap();

        assert_eq!(ids(&outcome.cache.events), vec!["b"]);
        assert_eq!(outcome.cache.events[0].summary, "B2");
        assert_eq!(outcome.cache.continuation_token, "token-2");
        assert_eq!(source.calls()[1], (Some("token-1".to_string()), None));
        assert!(outcome.cache.is_consistent());
    }

    #[test]
    fn unchanged_remote_yields_identical_events() {
        let source = ScriptedSource::new(vec![
            last_page(vec![item("a", "A")], "token-1"),
            last_page(Vec::new(), "token-1"),
        ]);
        let reconciler = Reconciler::new(&source, MemoryStore::new(), SyncConfig::default());

        let first = reconciler.sync_at(&key(), now()).unwrap();
        let second = reconciler.sync_at(&key(), now()).unwrap();

        assert_eq!(first.cache.events, second.cache.events);
        assert_eq!(second.stats, SyncStats::default());
    }

    #[test]
    fn invalid_token_rebuilds_cache_from_full_sync() {
        let store = MemoryStore::new();
        let mut stale = SyncCache::empty(&key(), now());
        stale.continuation_token = "expired".into();
        stale.events = vec![item("ghost", "Deleted long ago")];
        store.save(&stale).unwrap();

        let source = ScriptedSource::new(vec![
            Err(SourceError::TokenInvalid {
                message: "Sync token is no longer valid, a full sync is required.".into(),
            }),
            last_page(vec![item("a", "A")], "fresh"),
        ]);
        let reconciler = Reconciler::new(&source, store, SyncConfig::default());

        let outcome = reconciler.sync_at(&key(), now()).unwrap();

        assert!(outcome.full_resync);
        assert_eq!(ids(&outcome.cache.events), vec!["a"]);
        assert_eq!(outcome.cache.continuation_token, "fresh");
        assert_eq!(
            source.calls(),
            vec![(Some("expired".to_string()), None), (None, None)]
        );
    }

    #[test]
    fn second_token_failure_propagates() {
        let source = ScriptedSource::new(vec![
            Err(SourceError::TokenInvalid {
                message: "gone".into(),
            }),
            Err(SourceError::TokenInvalid {
                message: "gone again".into(),
            }),
        ]);
        let reconciler = Reconciler::new(&source, MemoryStore::new(), SyncConfig::default());

        let err = reconciler.sync_at(&key(), now()).unwrap_err();
        assert!(matches!(err, SyncError::Source(SourceError::TokenInvalid { .. })));
    }

    #[test]
    fn failed_page_leaves_stored_cache_untouched() {
        let store = MemoryStore::new();
        let mut existing = SyncCache::empty(&key(), now());
        existing.continuation_token = "token-1".into();
        existing.events = vec![item("a", "A")];
        store.save(&existing).unwrap();

        let source = ScriptedSource::new(vec![
            Ok(EventPage {
                items: vec![cancelled("a"), item("b", "B")],
                next_page_cursor: Some("page-2".into()),
                next_continuation_token: None,
            }),
            Err(SourceError::Api {
                status: 503,
                message: "backend unavailable".into(),
            }),
        ]);
        let reconciler = Reconciler::new(&source, store, SyncConfig::default());

        let err = reconciler.sync_at(&key(), now()).unwrap_err();
        assert!(matches!(err, SyncError::Source(SourceError::Api { status: 503, .. })));
        assert_eq!(reconciler.store().load(&key()).unwrap(), Some(existing));
    }

    #[test]
    fn missing_final_token_stores_empty_token() {
        let source = ScriptedSource::new(vec![Ok(EventPage {
            items: vec![item("a", "A")],
            next_page_cursor: None,
            next_continuation_token: None,
        })]);
        let reconciler = Reconciler::new(&source, MemoryStore::new(), SyncConfig::default());

        let outcome = reconciler.sync_at(&key(), now()).unwrap();
        assert!(!outcome.cache.has_token());
        assert_eq!(outcome.cache.events.len(), 1);
    }

    /// A remote that always returns one event named after the calendar and
    /// tracks how many requests are in flight per calendar.
    #[derive(Default)]
    struct EchoSource {
        in_flight: Mutex<HashMap<String, usize>>,
        max_same_key: AtomicUsize,
        requests: AtomicUsize,
    }

    impl EventSource for EchoSource {
        fn list_events(&self, request: &ListRequest<'_>) -> Result<EventPage, SourceError> {
            let calendar = request.calendar_id.to_string();
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                let count = in_flight.entry(calendar.clone()).or_default();
                *count += 1;
                self.max_same_key.fetch_max(*count, Ordering::SeqCst);
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
            self.requests.fetch_add(1, Ordering::SeqCst);
            *self
                .in_flight
                .lock()
                .unwrap()
                .get_mut(&calendar)
                .unwrap() -= 1;
            last_page(vec![item(&calendar, &calendar)], "token")
        }
    }

    #[test]
    fn sync_all_deduplicates_keys_and_keeps_order() {
        let account = AccountId::new("me@example.com").unwrap();
        let keys: Vec<CacheKey> = ["work", "home", "work", "gym", "home"]
            .into_iter()
            .map(|c| CacheKey::new(account.clone(), CalendarId::new(c).unwrap()))
            .collect();
        let source = EchoSource::default();
        let reconciler = Reconciler::new(
            &source,
            MemoryStore::new(),
            SyncConfig {
                workers: 4,
                ..SyncConfig::default()
            },
        );

        let results = reconciler.sync_all(&keys).unwrap();

        let synced: Vec<&str> = results.iter().map(|(k, _)| k.calendar_id.as_str()).collect();
        assert_eq!(synced, vec!["work", "home", "gym"]);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(source.requests.load(Ordering::SeqCst), 3);
        assert_eq!(source.max_same_key.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.store().list().unwrap().len(), 3);
    }

    #[test]
    fn cancelled_events_never_reach_the_cache() {
        let source = ScriptedSource::new(vec![last_page(
            vec![cancelled("a"), item("b", "B")],
            "token-1",
        )]);
        let reconciler = Reconciler::new(&source, MemoryStore::new(), SyncConfig::default());

        let outcome = reconciler.sync_at(&key(), now()).unwrap();
        assert!(
            outcome
                .cache
                .events
                .iter()
                .all(|e| e.status != EventStatus::Cancelled)
        );
        assert_eq!(outcome.stats.deleted, 0);
    }
}
