//! SQLite blob store.
//!
//! # Schema
//!
//! One row per cache in `sync_caches`, keyed by `{accountId}_{calendarId}`.
//! `data` holds the cache as JSON; `updated_at` is the ISO 8601 time of the
//! last save.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use ct_core::{CacheKey, CacheStore, StoreError, SyncCache};
use rusqlite::{Connection, OptionalExtension, params};

use crate::decode;

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(Box::new(e))
}

/// Sync caches in a SQLite database.
///
/// The connection sits behind a mutex so the store can be shared by sync
/// workers.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens a database at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path).map_err(backend)?)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(backend)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sync_caches (
                key TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                calendar_id TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string().into()))
    }
}

impl CacheStore for SqliteStore {
    fn load(&self, key: &CacheKey) -> Result<Option<SyncCache>, StoreError> {
        let storage_key = key.storage_key();
        let blob: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data FROM sync_caches WHERE key = ?1",
                params![storage_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        Ok(blob.and_then(|blob| decode(&blob, &storage_key)))
    }

    fn save(&self, cache: &SyncCache) -> Result<(), StoreError> {
        let data = serde_json::to_string(cache)?;
        let key = cache.key();
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(backend)?;
        tx.execute(
            "
            INSERT INTO sync_caches (key, account_id, calendar_id, data, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(key) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at
            ",
            params![
                key.storage_key(),
                key.account_id.as_str(),
                key.calendar_id.as_str(),
                data,
                updated_at
            ],
        )
        .map_err(backend)?;
        tx.commit().map_err(backend)?;

        tracing::debug!(key = %key, events = cache.events.len(), "saved sync cache");
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.conn()?
            .execute(
                "DELETE FROM sync_caches WHERE key = ?1",
                params![key.storage_key()],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<SyncCache>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, data FROM sync_caches ORDER BY account_id, calendar_id")
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(backend)?;

        let mut caches = Vec::new();
        for row in rows {
            let (key, blob) = row.map_err(backend)?;
            caches.extend(decode(&blob, &key));
        }
        Ok(caches)
    }
}
