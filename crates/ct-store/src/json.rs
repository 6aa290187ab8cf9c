//! File-per-calendar JSON store.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use ct_core::{CacheKey, CacheStore, StoreError, SyncCache};
use tempfile::NamedTempFile;

use crate::decode;

/// Stores each cache as pretty-printed JSON under one directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the cache for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let name: String = key
            .storage_key()
            .chars()
            .map(|c| if std::path::is_separator(c) { '_' } else { c })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn read(path: &Path) -> Result<Option<SyncCache>, StoreError> {
        match fs::read_to_string(path) {
            Ok(blob) => Ok(decode(&blob, &path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self, key: &CacheKey) -> Result<Option<SyncCache>, StoreError> {
        let path = self.path_for(key);
        let cache = Self::read(&path)?;
        Ok(cache.filter(|cache| {
            let matches = &cache.key() == key;
            if !matches {
                tracing::warn!(path = ?path, key = %key, "cache file belongs to another calendar");
            }
            matches
        }))
    }

    fn save(&self, cache: &SyncCache) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&cache.key());

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, cache)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        tracing::debug!(path = ?path, events = cache.events.len(), "saved sync cache");
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<SyncCache>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut caches = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                caches.extend(Self::read(&path)?);
            }
        }
        caches.sort_by_key(SyncCache::key);
        Ok(caches)
    }
}
