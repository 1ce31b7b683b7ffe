//! reqwest-backed transport.

use std::error::Error as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use batchfetch_core::{Error, SessionConfig};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, redirect::Policy};

use super::{Exchange, FileCookieJar, HeaderSink, RawResponse, Transport, TransportFailure};

/// Baseline headers sent with every exchange.
const BASELINE_HEADERS: &[(&str, &str)] = &[
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    ("accept-charset", "utf-8,iso-8859-1;q=0.7,*;q=0.5"),
    ("accept-language", "en-US,en;q=0.9"),
    ("accept-encoding", "gzip"),
    ("cache-control", "no-cache"),
];

/// HTTP transport shared by every exchange of a session.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    cookies: Arc<FileCookieJar>,
}

impl HttpTransport {
    /// Build the transport for `config`, persisting cookies at `cookie_jar`.
    pub fn new(config: &SessionConfig, cookie_jar: &Path) -> Result<Self, Error> {
        let mut defaults = HeaderMap::new();
        for &(name, value) in BASELINE_HEADERS {
            defaults.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        let cookies = Arc::new(FileCookieJar::open(cookie_jar));

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(defaults)
            .timeout(config.timeout())
            .redirect(redirect_policy(config))
            .cookie_provider(Arc::clone(&cookies))
            .danger_accept_invalid_certs(true)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, cookies })
    }

    /// Cookie jar backing this transport.
    pub fn cookies(&self) -> &FileCookieJar {
        &self.cookies
    }
}

/// Map the session's redirect settings onto a reqwest policy.
fn redirect_policy(config: &SessionConfig) -> Policy {
    if !config.follow_redirects {
        return Policy::none();
    }
    match config.max_redirects {
        0 => Policy::none(),
        n if n < 0 => Policy::custom(|attempt| attempt.follow()),
        n => Policy::limited(n as usize),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, exchange: Exchange, headers: HeaderSink) -> Result<RawResponse, TransportFailure> {
        let start = Instant::now();

        let request = match exchange.body {
            Some(body) => self
                .http
                .post(exchange.url.clone())
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body),
            None => self.http.get(exchange.url.clone()),
        };

        let response = request
            .header(header::REFERER, exchange.referer.as_str())
            .send()
            .await
            .map_err(|e| TransportFailure::new(describe(&e), None, start.elapsed()))?;

        let status = response.status().as_u16();

        if headers.is_enabled() {
            headers.line(&format!("{:?} {}", response.version(), response.status()));
            for (name, value) in response.headers() {
                headers.line(&format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())));
            }
        }

        let content_encoding = response
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportFailure::new(describe(&e), Some(status), start.elapsed()))?;

        let elapsed = start.elapsed();

        tracing::debug!(
            token = %exchange.token,
            url = %exchange.url,
            status,
            bytes = body.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "exchange complete"
        );

        Ok(RawResponse { status, body, content_encoding, elapsed })
    }
}

/// Render a reqwest error with its source chain.
fn describe(err: &reqwest::Error) -> String {
    let mut message = if err.is_timeout() { format!("timeout: {err}") } else { err.to_string() };
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
