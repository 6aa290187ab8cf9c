//! Events command: prints the normalized timeline.

use std::io::Write;

use anyhow::Result;
use ct_core::{Event, NormalizedTimeline};

use super::util::format_minutes;

/// Writes the timeline as text lines, or as JSON with `json`.
pub fn run<W: Write>(writer: &mut W, timeline: &NormalizedTimeline, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *writer, timeline)?;
        writeln!(writer)?;
        return Ok(());
    }

    if timeline.events.is_empty() {
        writeln!(writer, "No events in range.")?;
        return Ok(());
    }

    for event in &timeline.events {
        if let Some(line) = format_event(event) {
            writeln!(writer, "{line}")?;
        }
    }

    if !timeline.warnings.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Warnings:")?;
        for warning in &timeline.warnings {
            writeln!(writer, "- {warning}")?;
        }
    }
    Ok(())
}

/// One line per timed event; untimed events are not printed.
fn format_event(event: &Event) -> Option<String> {
    let (start, end) = event.span()?;
    let line = format!(
        "{} {}-{} {:>7}  {:<20} {}",
        start.format("%Y-%m-%d"),
        start.format("%H:%M"),
        end.format("%H:%M"),
        format_minutes(event.duration_minutes),
        category_label(event),
        event.summary,
    );
    Some(line.trim_end().to_string())
}

/// Deepest matched path under the event's charged top-level category.
fn category_label(event: &Event) -> &str {
    let Some(first) = event.categories.first() else {
        return "-";
    };
    event
        .categories
        .iter()
        .filter(|c| c.top_level() == first.top_level())
        .max_by_key(|c| c.path.matches('/').count())
        .map_or("-", |c| c.path.as_str())
}
