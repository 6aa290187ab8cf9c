//! Configuration loading and management.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ct_core::{AccountId, CacheKey, CalendarId, EventType, SyncConfig};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Where sync caches are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// One JSON file per calendar.
    #[default]
    Json,
    /// A single SQLite database.
    Sqlite,
}

impl CacheBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

/// A remote account and the calendars to track in it.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: AccountId,
    /// OAuth access token sent as a bearer credential.
    pub access_token: String,
    #[serde(default = "default_calendars")]
    pub calendars: Vec<CalendarId>,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("id", &self.id)
            .field("access_token", &"[REDACTED]")
            .field("calendars", &self.calendars)
            .finish()
    }
}

fn default_calendars() -> Vec<CalendarId> {
    CalendarId::new("primary").map(|c| vec![c]).unwrap_or_default()
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding sync caches.
    pub cache_dir: PathBuf,
    pub cache_backend: CacheBackend,
    /// Category rules and sleep preferences (JSON).
    pub preferences_path: PathBuf,
    /// Calendars synced concurrently.
    pub workers: usize,
    /// Events requested per page.
    pub page_size: u32,
    /// Event types counted as tracked time.
    pub event_types: Vec<EventType>,
    pub accounts: Vec<AccountConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let config_dir = dirs_config_path().unwrap_or_else(|| PathBuf::from("."));
        let sync = SyncConfig::default();
        Self {
            cache_dir: data_dir.join("cache"),
            cache_backend: CacheBackend::default(),
            preferences_path: config_dir.join("preferences.json"),
            workers: sync.workers,
            page_size: sync.page_size,
            event_types: EventType::TRACKED.to_vec(),
            accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (CT_*)
        figment = figment.merge(Env::prefixed("CT_"));

        figment.extract()
    }

    pub const fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            page_size: self.page_size,
            workers: self.workers,
        }
    }

    /// Every configured (account, calendar) pair, in configuration order.
    pub fn cache_keys(&self) -> Vec<CacheKey> {
        self.accounts
            .iter()
            .flat_map(|account| {
                account
                    .calendars
                    .iter()
                    .map(|calendar| CacheKey::new(account.id.clone(), calendar.clone()))
            })
            .collect()
    }

    /// Access tokens by account.
    pub fn tokens(&self) -> HashMap<AccountId, String> {
        self.accounts
            .iter()
            .map(|account| (account.id.clone(), account.access_token.clone()))
            .collect()
    }
}

/// Returns the platform-specific config directory for caltrack.
///
/// On Linux: `~/.config/caltrack`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("caltrack"))
}

/// Returns the platform-specific data directory for caltrack.
///
/// On Linux: `~/.local/share/caltrack`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("caltrack"))
}
