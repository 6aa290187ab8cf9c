//! Core domain logic for caltrack.
//!
//! This crate contains the fundamental types and logic for:
//! - Sync: reconciling per-calendar caches against a remote event source
//! - Normalization: turning fetched events into a gap-free, classified timeline
//! - Sleep inference: imputing sleep intervals from sparse markers
//! - Reporting: category, productivity and weekday/hour aggregations

pub mod cache;
pub mod event;
pub mod event_type;
mod fetch;
pub mod pipeline;
pub mod range;
pub mod report;
pub mod rules;
pub mod sleep;
pub mod source;
pub mod sync;
pub mod types;

pub use cache::{CacheKey, CacheStore, MemoryStore, StoreError, SyncCache};
pub use event::{CategoryMatch, Event, EventOrigin, EventStatus, EventTime, EventZone};
pub use event_type::{EventType, UnknownEventType};
pub use fetch::project;
pub use pipeline::{NormalizeOptions, NormalizedTimeline, PipelineError, normalize};
pub use range::{DatePreset, DateRange, RangeError};
pub use rules::{ClassificationWarning, RuleError, RuleTable};
pub use sleep::{DayAggregate, SleepError, SleepInference, SleepPreferences};
pub use source::{EventPage, EventSource, ListRequest, SourceError};
pub use sync::{Reconciler, SyncConfig, SyncError, SyncOutcome, SyncStats, merge_items};
pub use types::{AccountId, CalendarId, EventId, ValidationError};
