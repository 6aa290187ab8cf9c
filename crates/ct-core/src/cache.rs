//! Per-calendar sync cache and the storage seam it is persisted through.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{Event, EventStatus};
use crate::types::{AccountId, CalendarId, EventId};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A cache blob could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Failure inside a storage backend (database, lock, ...).
    #[error("cache backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Identifies one cache: an (account, calendar) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub account_id: AccountId,
    pub calendar_id: CalendarId,
}

impl CacheKey {
    pub const fn new(account_id: AccountId, calendar_id: CalendarId) -> Self {
        Self {
            account_id,
            calendar_id,
        }
    }

    /// Blob key: `{accountId}_{calendarId}`.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.account_id, self.calendar_id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.calendar_id)
    }
}

/// Local mirror of one remote calendar as of `last_sync_time`.
///
/// Events never carry `cancelled` status; ids are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCache {
    /// Opaque token from the last completed pass. Empty means "no prior sync".
    #[serde(default)]
    pub continuation_token: String,
    #[serde(default)]
    pub events: Vec<Event>,
    pub calendar_id: CalendarId,
    pub account_id: AccountId,
    pub last_sync_time: DateTime<Utc>,
}

impl SyncCache {
    /// An empty cache for a calendar that has never been synced.
    pub fn empty(key: &CacheKey, now: DateTime<Utc>) -> Self {
        Self {
            continuation_token: String::new(),
            events: Vec::new(),
            calendar_id: key.calendar_id.clone(),
            account_id: key.account_id.clone(),
            last_sync_time: now,
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.account_id.clone(), self.calendar_id.clone())
    }

    pub fn has_token(&self) -> bool {
        !self.continuation_token.is_empty()
    }

    /// Looks up a cached event by id.
    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.events.iter().find(|event| &event.id == id)
    }

    /// Whether every stored event satisfies the cache invariants.
    pub fn is_consistent(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.events
            .iter()
            .all(|event| event.status != EventStatus::Cancelled && seen.insert(&event.id))
    }
}

/// Durable keyed storage for sync caches.
///
/// Implementations must make `save` all-or-nothing: a failed write leaves the
/// previously stored cache readable.
pub trait CacheStore: Send + Sync {
    /// Loads the cache for `key`, or `None` if nothing usable is stored.
    fn load(&self, key: &CacheKey) -> Result<Option<SyncCache>, StoreError>;

    /// Replaces the stored cache for `cache.key()`.
    fn save(&self, cache: &SyncCache) -> Result<(), StoreError>;

    /// Removes the cache for `key`. Missing caches are not an error.
    fn delete(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Lists every stored cache.
    fn list(&self) -> Result<Vec<SyncCache>, StoreError>;
}

/// In-memory cache store.
///
/// Useful for tests and for embedding the engine without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    caches: Mutex<HashMap<CacheKey, SyncCache>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CacheKey, SyncCache>>, StoreError> {
        self.caches
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string().into()))
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &CacheKey) -> Result<Option<SyncCache>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn save(&self, cache: &SyncCache) -> Result<(), StoreError> {
        self.lock()?.insert(cache.key(), cache.clone());
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SyncCache>, StoreError> {
        let mut caches: Vec<_> = self.lock()?.values().cloned().collect();
        caches.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(caches)
    }
}
