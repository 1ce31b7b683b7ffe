//! Scripted in-memory transport for scheduler tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::transport::{Exchange, HeaderSink, RawResponse, Transport, TransportFailure};

/// Canned behaviour for one URL.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    status: u16,
    body: Vec<u8>,
    headers: Vec<(String, String)>,
    content_encoding: Option<String>,
    delay: Duration,
    failure: Option<String>,
}

impl Script {
    pub(crate) fn ok(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.as_bytes().to_vec(),
            headers: Vec::new(),
            content_encoding: None,
            delay: Duration::ZERO,
            failure: None,
        }
    }

    pub(crate) fn fail(message: &str) -> Self {
        Self { failure: Some(message.to_string()), ..Self::ok(0, "") }
    }

    pub(crate) fn binary(status: u16, body: Vec<u8>) -> Self {
        Self { body, ..Self::ok(status, "") }
    }

    pub(crate) fn encoded(status: u16, body: Vec<u8>, encoding: &str) -> Self {
        Self { body, content_encoding: Some(encoding.to_string()), ..Self::ok(status, "") }
    }

    pub(crate) fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub(crate) fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

/// Transport answering from a URL → script table.
///
/// Unknown URLs answer 404. Records every exchange and the peak number of
/// exchanges in progress at once.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    routes: HashMap<String, Script>,
    requests: Mutex<Vec<Exchange>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(mut self, url: &str, script: Script) -> Self {
        self.routes.insert(url.to_string(), script);
        self
    }

    pub(crate) fn requests(&self) -> Vec<Exchange> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.requests().iter().map(|e| e.url.to_string()).collect()
    }

    pub(crate) fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| *u == url).count()
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn exchange(&self, exchange: Exchange, headers: HeaderSink) -> Result<RawResponse, TransportFailure> {
        let script = self
            .routes
            .get(exchange.url.as_str())
            .cloned()
            .unwrap_or_else(|| Script::ok(404, "not found"));
        self.requests.lock().unwrap().push(exchange);

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = script.failure {
            return Err(TransportFailure::new(message, None, script.delay));
        }

        headers.line(&format!("HTTP/1.1 {}", script.status));
        for (name, value) in &script.headers {
            headers.line(&format!("{name}: {value}"));
        }

        Ok(RawResponse {
            status: script.status,
            body: Bytes::from(script.body),
            content_encoding: script.content_encoding,
            elapsed: script.delay,
        })
    }
}
