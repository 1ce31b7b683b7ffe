//! Fetch result shapes.
//!
//! A cache hit and a network fetch produce different shapes: a cache hit
//! carries only the body, since no status or headers are stored with cached
//! entries.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Result table of a batch fetch, keyed by the URL exactly as submitted.
pub type BatchResults = HashMap<String, FetchResult>;

/// Outcome of fetching one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FetchResult {
    /// Served from a fresh cache entry.
    Cached {
        #[serde(serialize_with = "lossy_text")]
        body: Vec<u8>,
    },
    /// Served by the transport.
    Fetched(FetchedResponse),
}

/// Full result of a transport exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedResponse {
    /// HTTP status code; 0 when the exchange failed before a status arrived.
    pub status: u16,
    /// Captured response headers; empty unless capture was requested.
    pub headers: BTreeMap<String, String>,
    /// Decompressed response body.
    #[serde(serialize_with = "lossy_text")]
    pub body: Vec<u8>,
    /// Total exchange time.
    #[serde(serialize_with = "seconds")]
    pub elapsed: Duration,
    /// Transport error text; empty when the exchange succeeded.
    pub error: String,
}

impl FetchResult {
    pub fn body(&self) -> &[u8] {
        match self {
            FetchResult::Cached { body } => body,
            FetchResult::Fetched(response) => &response.body,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, FetchResult::Cached { .. })
    }

    /// HTTP status, absent for cache hits.
    pub fn status(&self) -> Option<u16> {
        self.as_fetched().map(|r| r.status)
    }

    /// Transport error text, absent for cache hits.
    pub fn error(&self) -> Option<&str> {
        self.as_fetched().map(|r| r.error.as_str())
    }

    pub fn headers(&self) -> Option<&BTreeMap<String, String>> {
        self.as_fetched().map(|r| &r.headers)
    }

    pub fn as_fetched(&self) -> Option<&FetchedResponse> {
        match self {
            FetchResult::Cached { .. } => None,
            FetchResult::Fetched(response) => Some(response),
        }
    }

    /// Whether the transport reported an error for this request.
    pub fn is_failure(&self) -> bool {
        self.error().is_some_and(|e| !e.is_empty())
    }
}

/// Batch summary statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Number of distinct URLs in the table.
    pub total: usize,
    /// Number served from cache.
    pub cached: usize,
    /// Number served by the transport without error.
    pub fetched: usize,
    /// Number with a transport error.
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &BatchResults) -> Self {
        results.values().fold(Self { total: results.len(), ..Default::default() }, |mut acc, result| {
            if result.is_cached() {
                acc.cached += 1;
            } else if result.is_failure() {
                acc.failed += 1;
            } else {
                acc.fetched += 1;
            }
            acc
        })
    }
}

fn lossy_text<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

fn seconds<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}
