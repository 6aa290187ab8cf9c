//! Duration annotation and day-boundary splitting.

use crate::event::{Event, next_midnight};

/// Sets every timed event's duration to whole minutes between start and end.
pub fn annotate_durations(mut events: Vec<Event>) -> Vec<Event> {
    for event in &mut events {
        event.recompute_duration();
    }
    events
}

/// Splits events that run past the midnight after their start.
///
/// Such an event becomes `[start, midnight)` and `[midnight, end)`, both
/// keeping the original id and attributes. Calendar dates and midnight are
/// read in the start's offset. Events ending exactly at midnight stay whole.
pub fn split_overnight(events: Vec<Event>) -> Vec<Event> {
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let Some((start, end)) = event.span() else {
            out.push(event);
            continue;
        };
        let midnight = next_midnight(start);
        let end_date = end.with_timezone(start.offset()).date_naive();
        if end_date != start.date_naive() && end > midnight {
            out.push(event.with_span(start, midnight));
            out.push(event.with_span(midnight, end));
        } else {
            out.push(event);
        }
    }
    out
}
