use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use ct_core::Reconciler;
use ct_google::GoogleCalendarSource;
use tracing_subscriber::EnvFilter;

use ct_cli::commands::timeline::{self, Clock};
use ct_cli::commands::{calendars, events, report, status, sync};
use ct_cli::{Cli, Commands, Config, Preferences, Store, TimelineArgs};

/// Load config and open the configured cache store.
fn open_store(config_path: Option<&Path>) -> Result<(Store, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let store = Store::open(&config).context("failed to open cache store")?;
    Ok((store, config))
}

fn google_source(config: &Config) -> Result<GoogleCalendarSource> {
    GoogleCalendarSource::new(config.tokens()).context("failed to create Google Calendar client")
}

/// Events in range, normalized against the local clock.
fn load_timeline(
    config_path: Option<&Path>,
    args: &TimelineArgs,
) -> Result<(ct_core::NormalizedTimeline, Preferences)> {
    let (store, config) = open_store(config_path)?;
    let preferences = Preferences::load(&config.preferences_path)?;
    let clock = Clock::local();
    let range = timeline::resolve_range(&args.range, &clock)?;
    let keys = config.cache_keys();

    let fetched = if args.offline {
        timeline::cached_events(&store, &keys, &range)?
    } else {
        let reconciler = Reconciler::new(google_source(&config)?, store, config.sync_config());
        timeline::synced_events(&reconciler, &keys, &range)?
    };
    tracing::debug!(count = fetched.len(), "fetched events in range");

    let normalized = timeline::normalize_events(&fetched, range, &clock, &config, &preferences)?;
    Ok((normalized, preferences))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let config_path = cli.config.as_deref();

    match &cli.command {
        Some(Commands::Sync) => {
            let (store, config) = open_store(config_path)?;
            let reconciler = Reconciler::new(google_source(&config)?, store, config.sync_config());
            sync::run(&mut out, &reconciler, &config.cache_keys())?;
        }
        Some(Commands::Events(args)) => {
            let (normalized, _preferences) = load_timeline(config_path, args)?;
            events::run(&mut out, &normalized, args.json)?;
        }
        Some(Commands::Report(args)) => {
            let (normalized, preferences) = load_timeline(config_path, args)?;
            report::run(
                &mut out,
                &normalized.events,
                &preferences.productive_categories,
                args.json,
            )?;
        }
        Some(Commands::Status) => {
            let (store, config) = open_store(config_path)?;
            let location = format!(
                "{} ({})",
                config.cache_dir.display(),
                config.cache_backend.as_str()
            );
            status::run(&mut out, &store, &location)?;
        }
        Some(Commands::Calendars) => {
            let config = Config::load_from(config_path).context("failed to load configuration")?;
            let accounts: Vec<_> = config.accounts.iter().map(|a| a.id.clone()).collect();
            calendars::run(&mut out, &google_source(&config)?, &accounts)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
