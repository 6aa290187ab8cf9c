//! Durable sync cache storage for caltrack.
//!
//! Two [`CacheStore`] backends:
//! - [`JsonFileStore`]: one `{accountId}_{calendarId}.json` file per cache,
//!   replaced atomically through a temporary file in the same directory
//! - [`SqliteStore`]: JSON blobs in a single `rusqlite` table, one
//!   transaction per save
//!
//! Both treat an unreadable blob as "no cache": the next sync rebuilds it
//! from a full listing.

mod json;
mod sqlite;

pub use ct_core::{CacheKey, CacheStore, StoreError, SyncCache};
pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

/// Parses a stored blob, logging and discarding it when corrupt.
fn decode(blob: &str, origin: &dyn std::fmt::Display) -> Option<SyncCache> {
    match serde_json::from_str(blob) {
        Ok(cache) => Some(cache),
        Err(e) => {
            tracing::warn!(origin = %origin, error = %e, "ignoring corrupt sync cache");
            None
        }
    }
}
