//! Calendar time accounting CLI library.
//!
//! This crate provides the CLI interface for caltrack.

mod cli;
pub mod commands;
mod config;
mod preferences;
mod store;

pub use cli::{Cli, Commands, RangeArgs, TimelineArgs};
pub use config::{AccountConfig, CacheBackend, Config};
pub use preferences::Preferences;
pub use store::Store;
