//! Proportional redistribution of time shared by concurrent events.
//!
//! Every distinct start and end instant is a slice boundary. Each slice's
//! length is divided evenly among the events covering it, so the durations of
//! overlapping events always add up to the wall-clock time they span.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};

use crate::event::{Event, exact_minutes};

/// Orders events by start, longest first on ties. Events without a timed
/// start go last.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| match (a.start_instant(), b.start_instant()) {
        (Some(x), Some(y)) => x
            .cmp(&y)
            .then_with(|| b.duration_minutes.total_cmp(&a.duration_minutes)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Rewrites every event's duration as its share of the slices it covers.
///
/// Events without timed boundaries end up with zero duration.
pub fn redistribute(events: &mut [Event]) {
    let mut boundaries: Vec<DateTime<FixedOffset>> = events
        .iter()
        .filter_map(Event::span)
        .flat_map(|(start, end)| [start, end])
        .collect();
    boundaries.sort();
    boundaries.dedup();

    // Slice i is [boundaries[i], boundaries[i + 1]).
    let slice_count = boundaries.len().saturating_sub(1);
    let index_of = |instant: DateTime<FixedOffset>| boundaries.partition_point(|b| *b < instant);

    let covered: Vec<Option<(usize, usize)>> = events
        .iter()
        .map(|event| {
            event
                .span()
                .map(|(start, end)| (index_of(start), index_of(end).min(slice_count)))
        })
        .collect();

    let mut active = vec![0_u32; slice_count];
    for &(first, past_last) in covered.iter().flatten() {
        for count in active.iter_mut().take(past_last).skip(first) {
            *count += 1;
        }
    }

    let shares: Vec<f64> = (0..slice_count)
        .map(|i| match active[i] {
            0 => 0.0,
            k => exact_minutes(boundaries[i + 1] - boundaries[i]) / f64::from(k),
        })
        .collect();

    for (event, range) in events.iter_mut().zip(covered) {
        event.duration_minutes = range.map_or(0.0, |(first, past_last)| {
            shares.iter().take(past_last).skip(first).sum()
        });
    }
}
