//! Sync command for reconciling every configured calendar.

use std::io::Write;

use anyhow::{Context, Result};
use ct_core::{CacheKey, CacheStore, EventSource, Reconciler};

/// Syncs `keys` in parallel and prints one line per calendar.
///
/// Every calendar is attempted; the command fails afterwards if any did.
pub fn run<W: Write, S: EventSource, C: CacheStore>(
    writer: &mut W,
    reconciler: &Reconciler<S, C>,
    keys: &[CacheKey],
) -> Result<()> {
    if keys.is_empty() {
        writeln!(writer, "No calendars configured.")?;
        return Ok(());
    }

    let results = reconciler
        .sync_all(keys)
        .context("failed to start sync workers")?;
    let total = results.len();

    let mut failed = 0;
    for (key, result) in results {
        match result {
            Ok(outcome) => {
                let stats = outcome.stats;
                let resync = if outcome.full_resync {
                    " [full resync]"
                } else {
                    ""
                };
                writeln!(
                    writer,
                    "- {key}: +{} ~{} -{} ({} events){resync}",
                    stats.added,
                    stats.updated,
                    stats.deleted,
                    outcome.cache.events.len(),
                )?;
            }
            Err(err) => {
                failed += 1;
                tracing::error!(key = %key, error = %err, "sync failed");
                writeln!(writer, "- {key}: failed: {err}")?;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} calendars failed to sync");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use ct_core::{
        AccountId, CalendarId, EventPage, ListRequest, MemoryStore, SourceError, SyncConfig,
    };
    use insta::assert_snapshot;

    /// Serves two events for `primary`, fails for every other calendar.
    struct FixedSource;

    impl EventSource for FixedSource {
        fn list_events(&self, request: &ListRequest<'_>) -> Result<EventPage, SourceError> {
            if request.calendar_id.as_str() != "primary" {
                return Err(SourceError::Api {
                    status: 404,
                    message: "Not Found".to_string(),
                });
            }
            let items = serde_json::from_value(serde_json::json!([
                {"id": "a", "status": "confirmed", "summary": "Standup",
                 "start": {"dateTime": "2024-01-02T09:00:00Z"},
                 "end": {"dateTime": "2024-01-02T09:30:00Z"}},
                {"id": "b", "status": "confirmed", "summary": "Lunch",
                 "start": {"dateTime": "2024-01-02T12:00:00Z"},
                 "end": {"dateTime": "2024-01-02T13:00:00Z"}}
            ]))
            .unwrap();
            Ok(EventPage {
                items,
                next_page_cursor: None,
                next_continuation_token: Some("sync-1".to_string()),
            })
        }
    }

    fn key(calendar: &str) -> CacheKey {
        CacheKey::new(
            AccountId::new("me@example.com").unwrap(),
            CalendarId::new(calendar).unwrap(),
        )
    }

    #[test]
    fn sync_command_reports_each_calendar() {
        let reconciler = Reconciler::new(FixedSource, MemoryStore::new(), SyncConfig::default());

        let mut output = Vec::new();
        let result = run(
            &mut output,
            &reconciler,
            &[key("primary"), key("missing"), key("primary")],
        );

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        - me@example.com/primary: +2 ~0 -0 (2 events)
        - me@example.com/missing: failed: remote API error (404): Not Found
        ");
        assert_eq!(
            result.unwrap_err().to_string(),
            "1 of 2 calendars failed to sync"
        );
        assert!(reconciler.store().load(&key("primary")).unwrap().is_some());
    }

    #[test]
    fn sync_command_without_calendars() {
        let reconciler = Reconciler::new(FixedSource, MemoryStore::new(), SyncConfig::default());
        let mut output = Vec::new();
        run(&mut output, &reconciler, &[]).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No calendars configured.\n");
    }
}
