//! Deterministic cache key generation.

use std::fmt;

use sha2::{Digest, Sha256};

/// Cache slot identifier for a request.
///
/// Derived from the effective URL and POST body with no URL normalization;
/// equivalent URLs spelled differently map to different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for `url` followed by `body`.
    pub fn compute(url: &str, body: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(body.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Lowercase hex digest, also used as the cache file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
