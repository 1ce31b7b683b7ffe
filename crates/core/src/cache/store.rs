//! Cache entry storage on the local filesystem.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;

use super::hash::CacheKey;
use crate::{Error, SessionConfig};

#[derive(Debug, Clone)]
struct CacheDir {
    directory: PathBuf,
    ttl: Duration,
}

/// Response cache handle.
///
/// A disabled store never reports fresh entries. Writes are unconditional
/// overwrites without locking, so concurrent writers to one key race with
/// last-writer-wins semantics.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    dir: Option<CacheDir>,
}

impl CacheStore {
    /// Enabled store rooted at `directory` with entry lifetime `ttl`.
    pub fn new(directory: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self { dir: Some(CacheDir { directory: directory.into(), ttl }) }
    }

    /// Store that never hits and refuses reads and writes.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Build the store described by a validated session configuration.
    ///
    /// Creates the cache directory if it does not exist yet.
    pub fn from_config(config: &SessionConfig) -> Result<Self, Error> {
        if !config.cache {
            return Ok(Self::disabled());
        }
        let directory = config
            .cache_directory
            .as_ref()
            .ok_or_else(|| Error::Configuration("caching enabled without a cache directory".into()))?;
        if config.cache_age == 0 {
            return Err(Error::Configuration("cache age must be greater than 0".into()));
        }

        std::fs::create_dir_all(directory)
            .map_err(|e| Error::Storage(format!("cannot create {}: {e}", directory.display())))?;

        Ok(Self::new(directory, config.ttl()))
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Entry lifetime, if caching is enabled.
    pub fn ttl(&self) -> Option<Duration> {
        self.dir.as_ref().map(|d| d.ttl)
    }

    /// Compute the cache key for a request.
    pub fn key(&self, url: &str, body: &str) -> CacheKey {
        CacheKey::compute(url, body)
    }

    /// File backing `key`, if caching is enabled.
    pub fn path_for(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.directory.join(key.as_str()))
    }

    /// Whether a fresh entry exists for `key` right now.
    pub async fn is_fresh(&self, key: &CacheKey) -> bool {
        self.is_fresh_at(key, SystemTime::now()).await
    }

    /// Whether a fresh entry exists for `key` as observed at `now`.
    ///
    /// An entry whose modification time lies in the future counts as age zero.
    pub async fn is_fresh_at(&self, key: &CacheKey, now: SystemTime) -> bool {
        let Some(dir) = &self.dir else {
            return false;
        };
        let path = dir.directory.join(key.as_str());

        let modified = match fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);

        age < dir.ttl
    }

    /// Read the raw bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// `Error::Storage` if caching is disabled or the entry vanished or became
    /// unreadable since the freshness check.
    pub async fn read(&self, key: &CacheKey) -> Result<Vec<u8>, Error> {
        let path = self.require_path(key)?;
        fs::read(&path)
            .await
            .map_err(|e| Error::Storage(format!("cannot read cache entry {}: {e}", path.display())))
    }

    /// Overwrite the entry for `key` with `raw`.
    ///
    /// # Errors
    ///
    /// `Error::Storage` if caching is disabled or the file cannot be written.
    pub async fn write(&self, key: &CacheKey, raw: &[u8]) -> Result<(), Error> {
        let path = self.require_path(key)?;
        fs::write(&path, raw)
            .await
            .map_err(|e| Error::Storage(format!("cannot write cache entry {}: {e}", path.display())))?;

        tracing::debug!(key = %key, bytes = raw.len(), "cache entry written");
        Ok(())
    }

    fn require_path(&self, key: &CacheKey) -> Result<PathBuf, Error> {
        self.path_for(key)
            .ok_or_else(|| Error::Storage("caching is disabled".into()))
    }

    /// Cache directory, if caching is enabled.
    pub fn directory(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.directory.as_path())
    }
}
