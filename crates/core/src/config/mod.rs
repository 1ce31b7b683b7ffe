//! Session configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (BATCHFETCH_*)
//! 2. TOML config file (if BATCHFETCH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::Error;

mod validation;

pub use validation::ConfigError;

/// Name of the persistent cookie jar kept next to cached responses.
pub const COOKIE_JAR_FILE: &str = "cookies.txt";

/// Configuration shared by every request issued through one session.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (BATCHFETCH_*)
/// 2. TOML config file (if BATCHFETCH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Whether successful responses are cached on disk.
    ///
    /// Set via BATCHFETCH_CACHE environment variable.
    #[serde(default)]
    pub cache: bool,

    /// Directory holding one file per cache key.
    ///
    /// Required when `cache` is enabled. Set via BATCHFETCH_CACHE_DIRECTORY.
    #[serde(default)]
    pub cache_directory: Option<PathBuf>,

    /// Cache entry lifetime in seconds.
    ///
    /// Must be greater than 0 when `cache` is enabled. Set via BATCHFETCH_CACHE_AGE.
    #[serde(default = "default_cache_age")]
    pub cache_age: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via BATCHFETCH_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether redirects are followed at all.
    #[serde(default = "default_true")]
    pub follow_redirects: bool,

    /// Redirect budget: -1 unlimited, 0 disabled, n bounded.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: i64,

    /// Per-exchange timeout in milliseconds, enforced by the transport.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Default concurrency ceiling for batch fetches.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_cache_age() -> u64 {
    3600
}

fn default_user_agent() -> String {
    "batchfetch-bot/0.1 (+https://github.com/batchfetch/batchfetch)".into()
}

fn default_true() -> bool {
    true
}

fn default_max_redirects() -> i64 {
    -1
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache: false,
            cache_directory: None,
            cache_age: default_cache_age(),
            user_agent: default_user_agent(),
            follow_redirects: true,
            max_redirects: default_max_redirects(),
            timeout_ms: default_timeout_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl SessionConfig {
    /// Configuration with caching enabled under `directory` for `ttl_secs`.
    pub fn cached(directory: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        Self { cache: true, cache_directory: Some(directory.into()), cache_age: ttl_secs, ..Default::default() }
    }

    /// Cache lifetime as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_age)
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the redirect budget, toggling `follow_redirects` to match.
    ///
    /// # Errors
    ///
    /// Returns `Error::Argument` if `count` is below -1.
    pub fn set_max_redirects(&mut self, count: i64) -> Result<(), Error> {
        if count < -1 {
            return Err(Error::Argument(format!("max redirects must be -1, 0 or positive, got {count}")));
        }
        self.max_redirects = count;
        self.follow_redirects = count != 0;
        Ok(())
    }

    /// Persistent cookie jar location.
    ///
    /// `None` when caching is disabled; sessions then use an ephemeral jar.
    pub fn cookie_jar_path(&self) -> Option<PathBuf> {
        if !self.cache {
            return None;
        }
        self.cache_directory.as_ref().map(|dir| dir.join(COOKIE_JAR_FILE))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `BATCHFETCH_`
    /// 2. TOML file from `BATCHFETCH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("BATCHFETCH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("BATCHFETCH_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
