//! Clipping to the requested range.

use chrono::{DateTime, FixedOffset};

use crate::event::{Event, floor_minutes};

/// Drops events starting at or after `boundary` and shortens the duration of
/// events running past it. Their `end` is left untouched.
pub fn clip_future(events: Vec<Event>, boundary: DateTime<FixedOffset>) -> Vec<Event> {
    events
        .into_iter()
        .filter_map(|mut event| {
            let Some((start, end)) = event.span() else {
                return Some(event);
            };
            if start >= boundary {
                return None;
            }
            if end > boundary {
                event.duration_minutes = floor_minutes(boundary - start);
            }
            Some(event)
        })
        .collect()
}

/// Drops events ending before `from` and moves earlier starts up to `from`.
///
/// Events left with no whole minute are dropped. Events without timed
/// boundaries are kept as they are.
pub fn clip_past(events: Vec<Event>, from: DateTime<FixedOffset>) -> Vec<Event> {
    events
        .into_iter()
        .filter_map(|mut event| {
            let Some((start, end)) = event.span() else {
                tracing::warn!(id = %event.id, "event has no timed boundaries, skipping past clip");
                return Some(event);
            };
            if end < from {
                return None;
            }
            if start < from {
                event.set_start(from.with_timezone(start.offset()));
                event.duration_minutes = floor_minutes(end - from);
            }
            (event.duration_minutes > 0.0).then_some(event)
        })
        .collect()
}
