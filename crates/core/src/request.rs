//! Request descriptors and input normalization.
//!
//! Batch inputs arrive either as bare URLs or as explicit descriptors
//! (`[url, referer, body]` or `[url, referer, body, capture_headers]`).
//! Both normalize into a [`RequestSpec`].

use serde::{Deserialize, Serialize};

/// Immutable description of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    url: String,
    #[serde(default)]
    referer: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    capture_headers: bool,
}

impl RequestSpec {
    /// GET request for `url` with no referer and no header capture.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), referer: String::new(), body: String::new(), capture_headers: false }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    /// Attach a POST body; an empty body keeps the request a GET.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn capture_headers(mut self, capture: bool) -> Self {
        self.capture_headers = capture;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Referer as given; empty means "use the URL itself".
    pub fn referer(&self) -> &str {
        &self.referer
    }

    /// POST body; empty for GET requests.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_post(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn captures_headers(&self) -> bool {
        self.capture_headers
    }
}

/// Heterogeneous batch input entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestEntry {
    /// Bare URL; always captures headers.
    Url(String),
    /// `[url, referer, body]`; never captures headers.
    Triple(String, String, String),
    /// `[url, referer, body, capture_headers]`.
    Quad(String, String, String, bool),
}

impl From<RequestEntry> for RequestSpec {
    fn from(entry: RequestEntry) -> Self {
        match entry {
            RequestEntry::Url(url) => RequestSpec::new(url).capture_headers(true),
            RequestEntry::Triple(url, referer, body) => RequestSpec::new(url).with_referer(referer).with_body(body),
            RequestEntry::Quad(url, referer, body, capture) => RequestSpec::new(url)
                .with_referer(referer)
                .with_body(body)
                .capture_headers(capture),
        }
    }
}

impl From<&str> for RequestEntry {
    fn from(url: &str) -> Self {
        RequestEntry::Url(url.to_string())
    }
}

impl From<String> for RequestEntry {
    fn from(url: String) -> Self {
        RequestEntry::Url(url)
    }
}

impl From<RequestSpec> for RequestEntry {
    fn from(spec: RequestSpec) -> Self {
        RequestEntry::Quad(spec.url, spec.referer, spec.body, spec.capture_headers)
    }
}
