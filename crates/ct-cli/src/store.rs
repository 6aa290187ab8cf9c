//! The cache backend selected by configuration.

use std::fs;

use anyhow::{Context, Result};
use ct_core::{CacheKey, CacheStore, StoreError, SyncCache};
use ct_store::{JsonFileStore, SqliteStore};

use crate::config::{CacheBackend, Config};

/// SQLite database file inside the cache directory.
const SQLITE_FILE: &str = "caches.db";

/// Either configured backend behind one [`CacheStore`].
#[derive(Debug)]
pub enum Store {
    Json(JsonFileStore),
    Sqlite(SqliteStore),
}

impl Store {
    /// Opens the configured backend, creating the cache directory if needed.
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.cache_dir).with_context(|| {
            format!(
                "failed to create cache directory {}",
                config.cache_dir.display()
            )
        })?;
        match config.cache_backend {
            CacheBackend::Json => Ok(Self::Json(JsonFileStore::new(&config.cache_dir))),
            CacheBackend::Sqlite => {
                let path = config.cache_dir.join(SQLITE_FILE);
                let store = SqliteStore::open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                Ok(Self::Sqlite(store))
            }
        }
    }

    fn inner(&self) -> &dyn CacheStore {
        match self {
            Self::Json(store) => store,
            Self::Sqlite(store) => store,
        }
    }
}

impl CacheStore for Store {
    fn load(&self, key: &CacheKey) -> Result<Option<SyncCache>, StoreError> {
        self.inner().load(key)
    }

    fn save(&self, cache: &SyncCache) -> Result<(), StoreError> {
        self.inner().save(cache)
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.inner().delete(key)
    }

    fn list(&self) -> Result<Vec<SyncCache>, StoreError> {
        self.inner().list()
    }
}
