//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use ct_core::DatePreset;

/// Calendar time accounting.
///
/// Mirrors remote calendars into a local cache and turns them into a
/// gap-free, categorized account of where the time went.
#[derive(Debug, Parser)]
#[command(name = "ct", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile every configured calendar with its remote.
    Sync,

    /// Print the normalized, categorized timeline for a date range.
    Events(TimelineArgs),

    /// Summarize hours per category and productivity for a date range.
    Report(TimelineArgs),

    /// Show cached calendars and when they were last synced.
    Status,

    /// List the remote calendars of each configured account.
    Calendars,
}

/// Date range and output options shared by timeline commands.
#[derive(Debug, Clone, Args)]
pub struct TimelineArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Use cached events only; do not contact the remote.
    #[arg(long)]
    pub offline: bool,

    /// Output JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// A preset or an explicit `--from`/`--to` pair of local dates.
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    /// Named range (today, yesterday, this-week, last-7-days, last-14-days, this-month).
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub preset: Option<DatePreset>,

    /// First local date (YYYY-MM-DD).
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last local date (YYYY-MM-DD), inclusive.
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_explicit_range() {
        let cli = Cli::parse_from(["ct", "events", "--from", "2024-01-01", "--to", "2024-01-07"]);
        let Some(Commands::Events(args)) = cli.command else {
            panic!("expected events command");
        };
        assert_eq!(args.range.from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(args.range.to, NaiveDate::from_ymd_opt(2024, 1, 7));
        assert!(!args.offline);
    }

    #[test]
    fn parses_preset() {
        let cli = Cli::parse_from(["ct", "report", "--preset", "last-7-days", "--json"]);
        let Some(Commands::Report(args)) = cli.command else {
            panic!("expected report command");
        };
        assert_eq!(args.range.preset, Some(DatePreset::Last7Days));
        assert!(args.json);
    }

    #[test]
    fn rejects_preset_with_dates() {
        let result = Cli::try_parse_from([
            "ct", "events", "--preset", "today", "--from", "2024-01-01", "--to", "2024-01-02",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_half_open_range() {
        assert!(Cli::try_parse_from(["ct", "events", "--from", "2024-01-01"]).is_err());
    }
}
