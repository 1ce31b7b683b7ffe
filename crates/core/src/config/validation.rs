//! Configuration validation rules.
//!
//! This module provides validation logic for `SessionConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::SessionConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl SessionConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Missing` if caching is enabled without a directory
    /// - `ConfigError::Invalid` if caching is enabled with a zero `cache_age`,
    ///   `max_redirects` is below -1, `max_concurrency` is 0,
    ///   `timeout_ms` is outside 100ms to 5 minutes or `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache {
            if self.cache_directory.is_none() {
                return Err(ConfigError::Missing {
                    field: "cache_directory".into(),
                    hint: "Set BATCHFETCH_CACHE_DIRECTORY or disable caching".into(),
                });
            }
            if self.cache_age == 0 {
                return Err(ConfigError::Invalid {
                    field: "cache_age".into(),
                    reason: "must be greater than 0".into(),
                });
            }
        }

        if self.max_redirects < -1 {
            return Err(ConfigError::Invalid {
                field: "max_redirects".into(),
                reason: "must be -1 (unlimited), 0 (disabled) or positive".into(),
            });
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid { field: "max_concurrency".into(), reason: "must be at least 1".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.follow_redirects && self.max_redirects != 0 {
            tracing::debug!(
                max_redirects = self.max_redirects,
                "follow_redirects is disabled; max_redirects is ignored"
            );
        }

        Ok(())
    }
}
