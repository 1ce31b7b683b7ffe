//! File-backed response cache with TTL freshness.
//!
//! One file per cache key inside the configured directory:
//!
//! - filename is the lowercase hex SHA-256 of the effective URL followed by
//!   the POST body, without extension
//! - content is the raw response body exactly as received (possibly gzip-framed)
//! - an entry is fresh while `now - mtime < ttl`
//!
//! Entries are never evicted; staleness is only checked on read.

pub mod hash;
pub mod store;

pub use crate::Error;

pub use hash::CacheKey;
pub use store::CacheStore;
