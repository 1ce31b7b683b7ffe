//! Client code for batchfetch.
//!
//! This crate provides the HTTP transport, the exchange multiplexer, and the
//! fetch session that serves single and bounded-concurrency batch fetches
//! through the response cache.

pub mod batch;
pub mod multiplexer;
pub mod session;
pub mod resolve;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use multiplexer::{Completion, Multiplexer, MultiplexerIdle};
pub use session::FetchSession;
pub use transport::{
    DecodeError, Exchange, FileCookieJar, HeaderCapture, HeaderSink, HttpTransport, RawResponse, Transport,
    TransportFailure, decode_body, decode_cached, header_channel,
};
pub use resolve::{UrlError, join_base, normalize_base, validate_absolute};
