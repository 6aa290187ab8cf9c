//! CLI subcommand implementations.

pub mod calendars;
pub mod events;
pub mod report;
pub mod status;
pub mod sync;
pub mod timeline;
pub mod util;
