//! Response header accumulation for in-flight requests.

use std::collections::BTreeMap;
use std::fmt;

/// Correlation token assigned to a request when it is dispatched.
///
/// Unique per dispatch within a session; two in-flight requests for the same
/// URL always carry different tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl Token {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Header mapping being built for one request.
///
/// Lines are split on the first colon; names are lower-cased and trimmed,
/// values trimmed. Lines without a colon (status lines, blank terminators)
/// are dropped. A repeated header name keeps its last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCorrelator {
    token: Token,
    headers: BTreeMap<String, String>,
}

impl HeaderCorrelator {
    pub fn new(token: Token) -> Self {
        Self { token, headers: BTreeMap::new() }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Consume one raw header line, returning the number of bytes consumed.
    pub fn ingest(&mut self, line: &str) -> usize {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_lowercase();
            if !name.is_empty() {
                self.headers.insert(name, value.trim().to_string());
            }
        }
        line.len()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn into_headers(self) -> BTreeMap<String, String> {
        self.headers
    }
}
