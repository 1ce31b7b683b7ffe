//! Core types and shared functionality for batchfetch.
//!
//! This crate provides:
//! - File-backed response cache with TTL freshness
//! - Unified error types
//! - Session configuration with layered loading
//! - Request descriptors, header correlation and result shapes

pub mod cache;
pub mod config;
pub mod error;
pub mod headers;
pub mod request;
pub mod result;

pub use cache::{CacheKey, CacheStore};
pub use config::{ConfigError, SessionConfig};
pub use error::Error;
pub use headers::{HeaderCorrelator, Token};
pub use request::{RequestEntry, RequestSpec};
pub use result::{BatchResults, BatchSummary, FetchResult, FetchedResponse};
