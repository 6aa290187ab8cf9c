//! Status command for showing cached calendars.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use ct_core::CacheStore;

/// Lists every stored cache with its size and last sync time.
///
/// `location` describes where the caches live.
pub fn run<W: Write, C: CacheStore>(writer: &mut W, store: &C, location: &str) -> Result<()> {
    let caches = store.list().context("failed to list sync caches")?;

    writeln!(writer, "Calendar cache status")?;
    writeln!(writer, "Cache: {location}")?;

    if caches.is_empty() {
        writeln!(writer, "No calendars synced.")?;
        writeln!(writer)?;
        writeln!(writer, "Hint: Run 'ct sync' to populate the cache.")?;
        return Ok(());
    }

    writeln!(writer, "Calendars:")?;
    for cache in caches {
        let pending = if cache.has_token() {
            ""
        } else {
            ", full sync pending"
        };
        writeln!(
            writer,
            "- {}: {} events, last sync {}{pending}",
            cache.key(),
            cache.events.len(),
            cache
                .last_sync_time
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use ct_core::{AccountId, CacheKey, CalendarId, MemoryStore, SyncCache};
    use insta::assert_snapshot;

    fn cache(calendar: &str, token: &str, events: usize) -> SyncCache {
        let key = CacheKey::new(
            AccountId::new("me@example.com").unwrap(),
            CalendarId::new(calendar).unwrap(),
        );
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).single().unwrap();
        let mut cache = SyncCache::empty(&key, now);
        cache.continuation_token = token.to_string();
        for i in 0..events {
            cache
                .events
                .push(serde_json::from_value(serde_json::json!({"id": format!("e{i}")})).unwrap());
        }
        cache
    }

    #[test]
    fn status_command_lists_caches() {
        let store = MemoryStore::new();
        store.save(&cache("work", "", 0)).unwrap();
        store.save(&cache("primary", "sync-1", 2)).unwrap();

        let mut output = Vec::new();
        run(&mut output, &store, "[TEMP]/cache (json)").unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Calendar cache status
        Cache: [TEMP]/cache (json)
        Calendars:
        - me@example.com/primary: 2 events, last sync 2024-01-01T12:00:00Z
        - me@example.com/work: 0 events, last sync 2024-01-01T12:00:00Z, full sync pending
        ");
    }

    #[test]
    fn status_command_hints_when_empty() {
        let mut output = Vec::new();
        run(&mut output, &MemoryStore::new(), "memory").unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Calendar cache status
        Cache: memory
        No calendars synced.

        Hint: Run 'ct sync' to populate the cache.
        ");
    }
}
