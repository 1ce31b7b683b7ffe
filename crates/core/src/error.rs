//! Unified error types for batchfetch.
//!
//! Every error carries a stable upper-case code prefix in its display text so
//! callers and logs can classify failures without matching on variants.

use crate::config::ConfigError;

/// Unified error types for fetch sessions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session configuration is unusable (e.g. caching without a directory).
    #[error("CONFIGURATION_ERROR: {0}")]
    Configuration(String),

    /// Invalid call arguments (malformed URL, undersized batch, bad redirect count).
    #[error("ARGUMENT_ERROR: {0}")]
    Argument(String),

    /// Cache entry could not be read or written when it was expected to succeed.
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),

    /// A single fetch failed at the transport level.
    #[error("TRANSPORT_ERROR: {0}")]
    Transport(String),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Argument("batch must contain more than 1 element".to_string());
        assert!(err.to_string().starts_with("ARGUMENT_ERROR"));
        assert!(err.to_string().contains("more than 1 element"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = ConfigError::Invalid { field: "cache_age".into(), reason: "must be greater than 0".into() }.into();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("cache_age")));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Storage(_)));
        assert!(err.to_string().contains("STORAGE_ERROR"));
    }
}
