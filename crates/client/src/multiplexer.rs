//! Multiplexing many exchanges on one task.
//!
//! The multiplexer owns every registered exchange as a future in a
//! `FuturesUnordered` and exposes the three operations a scheduler loop needs:
//!
//! - [`Multiplexer::perform`] advances all exchanges without blocking
//! - [`Multiplexer::next_completion`] pops one finished exchange
//! - [`Multiplexer::wait`] suspends until something finishes or a timeout elapses
//!
//! It imposes no bound on how many exchanges are registered.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use batchfetch_core::Token;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::transport::{Exchange, HeaderSink, RawResponse, Transport, TransportFailure};

/// A finished exchange.
#[derive(Debug)]
pub struct Completion {
    /// Token the exchange was registered under
    pub token: Token,
    /// Transport outcome
    pub outcome: Result<RawResponse, TransportFailure>,
}

/// Returned by [`Multiplexer::wait`] when there is nothing to wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no exchanges registered")]
pub struct MultiplexerIdle;

/// Drives registered exchanges over a shared transport.
pub struct Multiplexer<T> {
    transport: Arc<T>,
    running: FuturesUnordered<BoxFuture<'static, Completion>>,
    finished: VecDeque<Completion>,
}

impl<T: Transport + 'static> Multiplexer<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport, running: FuturesUnordered::new(), finished: VecDeque::new() }
    }

    /// Register one exchange. Nothing happens until the next `perform` or `wait`.
    pub fn add(&mut self, exchange: Exchange, headers: HeaderSink) {
        let transport = Arc::clone(&self.transport);
        let token = exchange.token;
        self.running.push(
            async move {
                let outcome = transport.exchange(exchange, headers).await;
                Completion { token, outcome }
            }
            .boxed(),
        );
    }

    /// Advance every exchange as far as it can go without blocking.
    ///
    /// Returns the number of exchanges still running.
    pub fn perform(&mut self) -> usize {
        while let Some(Some(done)) = self.running.next().now_or_never() {
            self.finished.push_back(done);
        }
        self.running.len()
    }

    /// Pop the next finished exchange, if any.
    pub fn next_completion(&mut self) -> Option<Completion> {
        self.finished.pop_front()
    }

    /// Suspend until an exchange finishes or `timeout` elapses.
    ///
    /// Returns how many exchanges finished while waiting.
    ///
    /// # Errors
    ///
    /// `MultiplexerIdle` if no exchange is running.
    pub async fn wait(&mut self, timeout: Duration) -> Result<usize, MultiplexerIdle> {
        if self.running.is_empty() {
            return Err(MultiplexerIdle);
        }
        match tokio::time::timeout(timeout, self.running.next()).await {
            Ok(Some(done)) => {
                self.finished.push_back(done);
                Ok(1)
            }
            Ok(None) | Err(_) => Ok(0),
        }
    }

    /// Exchanges registered and not yet handed out by `next_completion`.
    pub fn registered(&self) -> usize {
        self.running.len() + self.finished.len()
    }
}
