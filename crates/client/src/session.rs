//! Fetch session: configuration, cache and transport shared by every request.
//!
//! ### Single fetch
//! 1. Validate the URL (and referer, defaulting it to the URL).
//! 2. Serve a fresh cache entry as a body-only result without touching the
//!    transport, unless the cache is bypassed.
//! 3. Otherwise perform one exchange; failures are fatal to the call.
//! 4. Persist non-empty 200 bodies, raw, when caching applies.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use batchfetch_core::{CacheStore, Error, FetchResult, FetchedResponse, RequestSpec, SessionConfig, Token};
use tempfile::TempPath;

use crate::resolve::validate_absolute;
use crate::transport::{Exchange, HttpTransport, Transport, decode_body, decode_cached, header_channel};

/// A configured fetch session.
///
/// Every request issued through a session shares its cache, its cookie jar
/// and its user agent and redirect policy.
pub struct FetchSession<T = HttpTransport> {
    pub(crate) config: SessionConfig,
    pub(crate) cache: CacheStore,
    pub(crate) transport: Arc<T>,
    tokens: AtomicU64,
    cookie_jar: PathBuf,
    // removes the ephemeral jar when the session is dropped
    _ephemeral_jar: Option<TempPath>,
}

impl FetchSession<HttpTransport> {
    /// Create a session talking HTTP through reqwest.
    ///
    /// The cookie jar lives at `<cache_directory>/cookies.txt` when caching is
    /// enabled and in a temporary file otherwise.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` for invalid settings, `Error::Storage` if the
    /// cache directory or cookie jar cannot be created.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        config.validate()?;
        let cache = CacheStore::from_config(&config)?;

        let (cookie_jar, ephemeral) = match config.cookie_jar_path() {
            Some(path) => (path, None),
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("batchfetch-cookies-")
                    .suffix(".txt")
                    .tempfile()?
                    .into_temp_path();
                (temp.to_path_buf(), Some(temp))
            }
        };

        let transport = HttpTransport::new(&config, &cookie_jar)?;

        tracing::debug!(
            cache = cache.is_enabled(),
            cookie_jar = %cookie_jar.display(),
            "fetch session ready"
        );

        Ok(Self::assemble(config, cache, transport, cookie_jar, ephemeral))
    }
}

impl<T: Transport + 'static> FetchSession<T> {
    /// Create a session over a caller-supplied transport.
    ///
    /// The transport owns cookie handling; `cookie_jar_path` reports the jar
    /// location the configuration designates, if any.
    pub fn with_transport(config: SessionConfig, transport: T) -> Result<Self, Error> {
        config.validate()?;
        let cache = CacheStore::from_config(&config)?;
        let cookie_jar = config.cookie_jar_path().unwrap_or_default();
        Ok(Self::assemble(config, cache, transport, cookie_jar, None))
    }

    fn assemble(
        config: SessionConfig, cache: CacheStore, transport: T, cookie_jar: PathBuf, ephemeral: Option<TempPath>,
    ) -> Self {
        Self {
            config,
            cache,
            transport: Arc::new(transport),
            tokens: AtomicU64::new(1),
            cookie_jar,
            _ephemeral_jar: ephemeral,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Cookie jar file shared by every exchange of this session.
    pub fn cookie_jar_path(&self) -> &Path {
        &self.cookie_jar
    }

    /// Fresh correlation token; never reused within the session.
    pub(crate) fn next_token(&self) -> Token {
        Token::new(self.tokens.fetch_add(1, Ordering::Relaxed))
    }

    /// Fetch one URL, serving the cache when allowed.
    ///
    /// # Errors
    ///
    /// - `Error::Argument` for a malformed URL or referer
    /// - `Error::Storage` if a fresh entry cannot be read or a 200 body cannot be cached
    /// - `Error::Transport` if the exchange fails
    pub async fn fetch(&self, spec: &RequestSpec, bypass_cache: bool) -> Result<FetchResult, Error> {
        let url = validate_absolute(spec.url()).map_err(|e| Error::Argument(e.to_string()))?;
        let referer = if spec.referer().is_empty() {
            spec.url().to_string()
        } else {
            validate_absolute(spec.referer()).map_err(|e| Error::Argument(format!("referer: {e}")))?;
            spec.referer().to_string()
        };

        let use_cache = self.cache.is_enabled() && !bypass_cache;
        let key = self.cache.key(spec.url(), spec.body());

        if use_cache && self.cache.is_fresh(&key).await {
            let raw = self.cache.read(&key).await?;
            let body = decode_cached(&raw);
            tracing::debug!(url = spec.url(), key = %key, "cache hit");
            return Ok(FetchResult::Cached { body });
        }

        let token = self.next_token();
        let (sink, capture) = header_channel(token, spec.captures_headers());
        let exchange = Exchange {
            token,
            url,
            referer,
            body: spec.is_post().then(|| spec.body().to_string()),
        };

        let raw = self
            .transport
            .exchange(exchange, sink)
            .await
            .map_err(|f| Error::Transport(f.message))?;

        if use_cache && !raw.body.is_empty() && raw.status == 200 {
            self.cache.write(&key, &raw.body).await?;
        }

        let body = decode_body(&raw.body, raw.content_encoding.as_deref()).map_err(|e| Error::Transport(e.to_string()))?;

        tracing::debug!(url = spec.url(), %token, status = raw.status, "fetched");

        Ok(FetchResult::Fetched(FetchedResponse {
            status: raw.status,
            headers: capture.finish(),
            body,
            elapsed: raw.elapsed,
            error: String::new(),
        }))
    }
}
