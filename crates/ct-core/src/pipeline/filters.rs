//! Inclusion filters.

use crate::event::{Event, EventTime};
use crate::event_type::EventType;

/// Drops events whose start is a bare date.
pub fn drop_all_day(events: Vec<Event>) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| !matches!(event.start, Some(EventTime::AllDay { .. })))
        .collect()
}

/// Keeps events whose type is in `allowed`.
///
/// An item without an `eventType` field deserializes as
/// [`EventType::Default`], so it is kept whenever `default` is allowed.
/// The remote API always sends the field on real events.
pub fn keep_event_types(events: Vec<Event>, allowed: &[EventType]) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| allowed.contains(&event.event_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: serde_json::Value) -> Event {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn all_day_events_are_dropped() {
        let events = vec![
            event(serde_json::json!({"id": "a", "start": {"date": "2024-01-01"}, "end": {"date": "2024-01-02"}})),
            event(serde_json::json!({
                "id": "b",
                "start": {"dateTime": "2024-01-01T09:00:00Z"},
                "end": {"dateTime": "2024-01-01T10:00:00Z"},
            })),
        ];
        let kept = drop_all_day(events);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.as_str(), "b");
    }

    #[test]
    fn only_allowed_types_survive() {
        let events = vec![
            event(serde_json::json!({"id": "a", "eventType": "default"})),
            event(serde_json::json!({"id": "b", "eventType": "focusTime"})),
            event(serde_json::json!({"id": "c", "eventType": "fromGmail"})),
            event(serde_json::json!({"id": "d"})),
        ];
        let ids: Vec<_> = keep_event_types(events, &EventType::TRACKED)
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
    }

    #[test]
    fn missing_type_is_treated_as_default() {
        let untyped = || vec![event(serde_json::json!({"id": "a"}))];
        assert_eq!(keep_event_types(untyped(), &[EventType::Default]).len(), 1);
        assert!(keep_event_types(untyped(), &[EventType::FocusTime]).is_empty());
    }
}
