#![warn(missing_docs)]
//! Stateful HTTP/1.x message parser for passive traffic monitoring.
//!
//! This crate reconstructs HTTP/1.0 and HTTP/1.1 messages from raw TCP
//! payload bytes delivered in order, one direction at a time. It never owns
//! the connection: bytes are appended to a per-direction [`Stream`] as they
//! are captured, and [`parse_message`] advances an internal state machine
//! that copes with arbitrary segmentation — a message may arrive one byte at
//! a time or many pipelined messages may arrive in a single segment.
//!
//! # Key types
//!
//! - [`Stream`] — buffer plus parse state for one direction of a flow. Use
//!   [`feed()`](Stream::feed) to push captured bytes and [`parse_message`]
//!   to drive parsing.
//! - [`Message`] — one reconstructed request or response, frozen once the
//!   parser reports [`ParseStatus::Complete`].
//! - [`H1Options`] — header-selection policy and resource limits.
//!
//! # Example
//!
//! ```
//! use h1session::{parse_message, H1Options, ParseStatus, Stream, TimestampNs};
//!
//! let opts = H1Options::default();
//! let mut stream = Stream::new();
//! stream.feed(b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n", TimestampNs(0));
//!
//! match parse_message(&mut stream, &opts) {
//!     ParseStatus::Complete => {
//!         let (msg, _raw) = stream.finish_message().unwrap();
//!         assert_eq!(msg.method, "GET");
//!     }
//!     other => panic!("unexpected status: {other:?}"),
//! }
//! ```
//!
//! # Framing rules
//!
//! Body length is taken from, in priority order: the no-body status codes
//! (1xx, 204, 304), `Transfer-Encoding: chunked`, `Content-Length`, and
//! finally connection-close framing for HTTP/1.0-style responses (the caller
//! signals connection end via [`Stream::finish_at_close`]).
//!
//! # Feature flags
//!
//! - **`tracing`** — emit `tracing::warn!` events when a stream turns out not
//!   to carry parseable HTTP.

pub mod scan;

mod parse;
mod state;


#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub use parse::parse_message;
pub use state::{
    H1Options,
    HeaderPolicy,
    Message,
    MessageKind,
    ParseError,
    ParseErrorKind,
    ParseStatus,
    Stream,
    TimestampNs,
};
pub(crate) use trace_warn;
