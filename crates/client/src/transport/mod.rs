//! Transport collaborator: one HTTP exchange per call.
//!
//! ### Contract
//! - Input: absolute URL, referer, optional POST body, correlation token.
//! - Uses the session's cookie jar, user agent and redirect policy plus a
//!   fixed baseline header set (`accept`, `accept-charset`,
//!   `accept-language`, `accept-encoding: gzip`, `cache-control: no-cache`).
//! - Certificate verification is disabled.
//! - Output: status, raw body bytes as received, elapsed time.
//! - Header lines are pushed into a [`HeaderSink`] scoped to the request, so
//!   no header state is shared between requests.
//!
//! Concurrency limiting is the caller's job; a transport accepts as many
//! simultaneous exchanges as it is handed.

pub mod cookies;
pub mod decode;
pub mod http;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use batchfetch_core::{HeaderCorrelator, Token};
use bytes::Bytes;
use tokio::sync::mpsc;
use url::Url;

pub use cookies::FileCookieJar;
pub use decode::{DecodeError, decode_body, decode_cached};
pub use http::HttpTransport;

/// One exchange handed to a transport.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Correlation token of the dispatch
    pub token: Token,
    /// Absolute request URL
    pub url: Url,
    /// Referer header value
    pub referer: String,
    /// POST body; `None` issues a GET
    pub body: Option<String>,
}

/// Raw outcome of a successful exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Body bytes exactly as received (possibly gzip-framed)
    pub body: Bytes,
    /// Content-Encoding header, if any
    pub content_encoding: Option<String>,
    /// Time taken by the exchange
    pub elapsed: Duration,
}

/// Exchange failure with whatever data was gathered before it failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// Transport diagnostic text
    pub message: String,
    /// Status, if the response head arrived before the failure
    pub status: Option<u16>,
    /// Time spent before the failure
    pub elapsed: Duration,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>, status: Option<u16>, elapsed: Duration) -> Self {
        Self { message: message.into(), status, elapsed }
    }
}

/// A client able to perform one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `exchange`, reporting response header lines to `headers`.
    async fn exchange(&self, exchange: Exchange, headers: HeaderSink) -> Result<RawResponse, TransportFailure>;
}

/// Sending half of a per-request header channel.
#[derive(Debug)]
pub struct HeaderSink {
    token: Token,
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl HeaderSink {
    pub fn token(&self) -> Token {
        self.token
    }

    /// Whether the request asked for its headers.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Report one raw header line; returns the bytes consumed.
    pub fn line(&self, raw: &str) -> usize {
        if let Some(tx) = &self.tx {
            // the receiver only goes away once the request is torn down
            let _ = tx.send(raw.to_string());
        }
        raw.len()
    }
}

/// Receiving half of a per-request header channel.
#[derive(Debug)]
pub struct HeaderCapture {
    correlator: HeaderCorrelator,
    rx: Option<mpsc::UnboundedReceiver<String>>,
}

impl HeaderCapture {
    pub fn token(&self) -> Token {
        self.correlator.token()
    }

    /// Fold every line reported so far into the header mapping.
    pub fn finish(mut self) -> BTreeMap<String, String> {
        if let Some(mut rx) = self.rx.take() {
            while let Ok(line) = rx.try_recv() {
                self.correlator.ingest(&line);
            }
        }
        self.correlator.into_headers()
    }
}

/// Create the header channel for the request dispatched under `token`.
///
/// When `capture` is false the sink discards every line and the capture
/// finishes with an empty mapping.
pub fn header_channel(token: Token, capture: bool) -> (HeaderSink, HeaderCapture) {
    let correlator = HeaderCorrelator::new(token);
    if !capture {
        return (HeaderSink { token, tx: None }, HeaderCapture { correlator, rx: None });
    }
    let (tx, rx) = mpsc::unbounded_channel();
    (HeaderSink { token, tx: Some(tx) }, HeaderCapture { correlator, rx: Some(rx) })
}
