//! Bounded-concurrency batch fetching.
//!
//! ### Phases
//!
//! 1. **Cache sweep** (caching enabled only): every request with a fresh
//!    entry resolves immediately to a body-only result. If nothing is left,
//!    the transport is never touched.
//! 2. **Pipeline**: the remaining requests sit in a FIFO pending queue. At
//!    most `min(remaining, max_concurrency)` are registered with the
//!    multiplexer at once. The loop alternates drive → drain completions →
//!    wait, and each completion admits the next pending request into its
//!    slot before the finished request is torn down.
//!
//! One task owns the pending queue, the in-flight table and the cache writes,
//! so none of them needs a lock.
//!
//! ### Failure isolation
//! A transport failure only marks its own row with a non-empty error. The
//! batch as a whole fails only for invalid arguments or when a cache entry
//! reported fresh cannot be read back during the sweep.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use batchfetch_core::{
    BatchResults, BatchSummary, CacheKey, Error, FetchResult, FetchedResponse, RequestEntry, RequestSpec, Token,
};
use bytes::Bytes;
use url::Url;

use crate::multiplexer::{Completion, Multiplexer};
use crate::resolve::{join_base, normalize_base, validate_absolute};
use crate::session::FetchSession;
use crate::transport::{Exchange, HeaderCapture, Transport, decode_body, decode_cached, header_channel};

/// Upper bound on a single wait for multiplexer activity.
const WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Sleep applied only when the multiplexer cannot be waited on.
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// A request resolved against the base URL, ready for dispatch.
#[derive(Debug)]
struct Prepared {
    spec: RequestSpec,
    url: Url,
    referer: String,
    key: CacheKey,
}

/// A dispatched request: its spec, cache slot and header channel, stored
/// under its correlation token and removed as one unit.
#[derive(Debug)]
struct InFlight {
    spec: RequestSpec,
    key: CacheKey,
    headers: HeaderCapture,
}

/// Scheduler state owned by the driving task.
struct Pipeline {
    pending: VecDeque<Prepared>,
    in_flight: HashMap<Token, InFlight>,
    ceiling: usize,
    results: BatchResults,
    /// Most exchanges the multiplexer held at once.
    peak_registered: usize,
}

/// What one batch run produced.
struct BatchRun {
    results: BatchResults,
    peak_registered: usize,
}

impl Pipeline {
    fn is_done(&self) -> bool {
        self.in_flight.is_empty() && self.pending.is_empty()
    }
}

/// Transport outcome flattened into the fields a result row records.
struct Outcome {
    status: u16,
    raw: Bytes,
    content_encoding: Option<String>,
    elapsed: Duration,
    error: String,
}

impl Outcome {
    fn split(completion: Completion) -> (Token, Self) {
        let outcome = match completion.outcome {
            Ok(raw) => Outcome {
                status: raw.status,
                raw: raw.body,
                content_encoding: raw.content_encoding,
                elapsed: raw.elapsed,
                error: String::new(),
            },
            Err(failure) => Outcome {
                status: failure.status.unwrap_or(0),
                raw: Bytes::new(),
                content_encoding: None,
                elapsed: failure.elapsed,
                error: failure.message,
            },
        };
        (completion.token, outcome)
    }
}

impl<T: Transport + 'static> FetchSession<T> {
    /// Fetch every entry with at most `max_concurrency` exchanges in flight.
    ///
    /// Relative URLs and referers are prefixed with `base_url` (when
    /// non-empty) before use, but the returned table is keyed by each URL
    /// exactly as submitted. Duplicate URLs are all fetched; the table keeps
    /// one row per distinct URL.
    ///
    /// # Errors
    ///
    /// - `Error::Argument` if fewer than 2 entries are given, `max_concurrency`
    ///   is 0, or the base URL or any request URL is malformed
    /// - `Error::Storage` if a cache entry found fresh cannot be read
    pub async fn fetch_all<E>(&self, entries: Vec<E>, base_url: &str, max_concurrency: usize) -> Result<BatchResults, Error>
    where
        E: Into<RequestEntry>,
    {
        self.run_batch(entries, base_url, max_concurrency).await.map(|run| run.results)
    }

    async fn run_batch<E>(&self, entries: Vec<E>, base_url: &str, max_concurrency: usize) -> Result<BatchRun, Error>
    where
        E: Into<RequestEntry>,
    {
        if entries.len() < 2 {
            return Err(Error::Argument("batch must contain more than 1 element".into()));
        }
        if max_concurrency == 0 {
            return Err(Error::Argument("max concurrency must be at least 1".into()));
        }

        let base = if base_url.is_empty() {
            None
        } else {
            Some(normalize_base(base_url).map_err(|e| Error::Argument(format!("base URL: {e}")))?)
        };

        let prepared = entries
            .into_iter()
            .map(|entry| self.prepare(RequestSpec::from(entry.into()), base.as_deref()))
            .collect::<Result<Vec<_>, Error>>()?;
        let submitted = prepared.len();

        let mut results = BatchResults::with_capacity(submitted);
        let pending = self.sweep_cache(prepared, &mut results).await?;

        if pending.is_empty() {
            tracing::info!(submitted, cached = results.len(), "batch served entirely from cache");
            return Ok(BatchRun { results, peak_registered: 0 });
        }

        let ceiling = pending.len().min(max_concurrency);
        tracing::info!(submitted, cached = results.len(), pending = pending.len(), ceiling, "starting batch");

        let mut pipeline = Pipeline {
            pending: pending.into(),
            in_flight: HashMap::with_capacity(ceiling + 1),
            ceiling,
            results,
            peak_registered: 0,
        };
        let mut mux = Multiplexer::new(Arc::clone(&self.transport));

        self.drive(&mut pipeline, &mut mux).await;

        let summary = BatchSummary::from_results(&pipeline.results);
        tracing::info!(
            total = summary.total,
            cached = summary.cached,
            fetched = summary.fetched,
            failed = summary.failed,
            "batch complete"
        );

        Ok(BatchRun { results: pipeline.results, peak_registered: pipeline.peak_registered })
    }

    /// Resolve a request against the base URL and compute its cache key.
    fn prepare(&self, spec: RequestSpec, base: Option<&str>) -> Result<Prepared, Error> {
        let effective = join_base(base, spec.url());
        let url = validate_absolute(&effective).map_err(|e| Error::Argument(e.to_string()))?;

        let referer = if spec.referer().is_empty() {
            effective.clone()
        } else {
            let referer = join_base(base, spec.referer());
            validate_absolute(&referer).map_err(|e| Error::Argument(format!("referer: {e}")))?;
            referer
        };

        let key = self.cache.key(&effective, spec.body());
        Ok(Prepared { spec, url, referer, key })
    }

    /// Resolve fresh cache entries; returns the requests still to fetch.
    async fn sweep_cache(&self, prepared: Vec<Prepared>, results: &mut BatchResults) -> Result<Vec<Prepared>, Error> {
        if !self.cache.is_enabled() {
            return Ok(prepared);
        }

        let mut remaining = Vec::with_capacity(prepared.len());
        for request in prepared {
            if !self.cache.is_fresh(&request.key).await {
                remaining.push(request);
                continue;
            }

            let raw = self.cache.read(&request.key).await?;
            let body = decode_cached(&raw);
            tracing::debug!(url = request.spec.url(), key = %request.key, "cache hit");
            results.insert(request.spec.url().to_string(), FetchResult::Cached { body });
        }
        Ok(remaining)
    }

    /// Run the pipeline until nothing is pending or in flight.
    async fn drive(&self, pipeline: &mut Pipeline, mux: &mut Multiplexer<T>) {
        self.fill(pipeline, mux);

        while !pipeline.is_done() {
            mux.perform();

            let mut completed = 0usize;
            while let Some(completion) = mux.next_completion() {
                completed += 1;
                self.complete(pipeline, mux, completion).await;
            }

            if pipeline.is_done() {
                break;
            }
            if completed == 0 && !pipeline.in_flight.is_empty() {
                if let Err(e) = mux.wait(WAIT_TIMEOUT).await {
                    tracing::warn!(error = %e, in_flight = pipeline.in_flight.len(), "multiplexer wait failed");
                    tokio::time::sleep(IDLE_BACKOFF).await;
                }
            }
            if pipeline.in_flight.is_empty() {
                // every slot drained without a refill; restart admission
                self.fill(pipeline, mux);
            }
        }
    }

    /// Admit pending requests until the ceiling is reached.
    fn fill(&self, pipeline: &mut Pipeline, mux: &mut Multiplexer<T>) {
        while pipeline.in_flight.len() < pipeline.ceiling {
            let Some(next) = pipeline.pending.pop_front() else {
                break;
            };
            self.admit(pipeline, mux, next);
        }
    }

    /// Dispatch one request under a fresh token.
    fn admit(&self, pipeline: &mut Pipeline, mux: &mut Multiplexer<T>, request: Prepared) {
        let token = self.next_token();
        let (sink, headers) = header_channel(token, request.spec.captures_headers());
        let exchange = Exchange {
            token,
            url: request.url,
            referer: request.referer,
            body: request.spec.is_post().then(|| request.spec.body().to_string()),
        };

        tracing::debug!(%token, url = %exchange.url, in_flight = pipeline.in_flight.len(), "admitting request");

        pipeline
            .in_flight
            .insert(token, InFlight { spec: request.spec, key: request.key, headers });
        mux.add(exchange, sink);

        let registered = mux.registered();
        debug_assert!(registered <= pipeline.ceiling, "{registered} exchanges registered, ceiling {}", pipeline.ceiling);
        pipeline.peak_registered = pipeline.peak_registered.max(registered);
    }

    /// Record one completion, refilling its slot first.
    async fn complete(&self, pipeline: &mut Pipeline, mux: &mut Multiplexer<T>, completion: Completion) {
        let (token, outcome) = Outcome::split(completion);
        if !pipeline.in_flight.contains_key(&token) {
            tracing::warn!(%token, "completion for unknown request");
            return;
        }

        if let Some(next) = pipeline.pending.pop_front() {
            self.admit(pipeline, mux, next);
        }

        let Some(entry) = pipeline.in_flight.remove(&token) else {
            return;
        };
        let headers = entry.headers.finish();

        if self.cache.is_enabled() && !outcome.raw.is_empty() && outcome.status == 200 {
            if let Err(e) = self.cache.write(&entry.key, &outcome.raw).await {
                tracing::warn!(url = entry.spec.url(), error = %e, "skipping cache write");
            }
        }

        let (body, error) = match decode_body(&outcome.raw, outcome.content_encoding.as_deref()) {
            Ok(body) => (body, outcome.error),
            Err(e) if outcome.error.is_empty() => (outcome.raw.to_vec(), e.to_string()),
            Err(_) => (outcome.raw.to_vec(), outcome.error),
        };

        tracing::debug!(
            %token,
            url = entry.spec.url(),
            status = outcome.status,
            error = error.as_str(),
            "request complete"
        );

        pipeline.results.insert(
            entry.spec.url().to_string(),
            FetchResult::Fetched(FetchedResponse { status: outcome.status, headers, body, elapsed: outcome.elapsed, error }),
        );
    }
}
