use std::collections::{HashMap, HashSet};

/// Newtype for nanosecond-precision timestamps (nanoseconds since epoch,
/// as stamped by the capture layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimestampNs(pub u64);

impl TimestampNs {
    /// Returns `self - other`, clamped to zero on underflow.
    pub fn saturating_sub(self, other: TimestampNs) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl std::fmt::Display for TimestampNs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl From<u64> for TimestampNs {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<TimestampNs> for u64 {
    fn from(v: TimestampNs) -> Self {
        v.0
    }
}

/// Which headers the parser retains in [`Message::headers`].
///
/// The sentinel headers (`content-length`, `transfer-encoding`,
/// `connection`) and the configured client-IP header are lifted into
/// dedicated [`Message`] fields regardless of this policy.
#[derive(Debug, Clone, Default)]
pub enum HeaderPolicy {
    /// Keep no headers in the map.
    #[default]
    None,
    /// Keep every header.
    All,
    /// Keep only the listed headers (lower-cased names).
    Allowlist(HashSet<String>),
}

/// Parser options and resource limits.
///
/// One value is built from the host configuration at startup and borrowed
/// immutably by every parse call.
#[derive(Debug, Clone)]
pub struct H1Options {
    /// Header retention policy for the message header map.
    pub header_policy:    HeaderPolicy,
    /// Lower-cased name of a client-identifying header (e.g.
    /// `x-forwarded-for`) whose value is lifted into
    /// [`Message::client_ip`]. `None` disables the lookup.
    pub client_ip_header: Option<String>,
    /// Maximum buffered bytes per direction. The caller drops the whole
    /// stream when an append pushes the buffer past this limit.
    pub max_buffer_size:  usize,
}

impl Default for H1Options {
    fn default() -> Self {
        Self {
            header_policy:    HeaderPolicy::None,
            client_ip_header: None,
            max_buffer_size:  10 * 1024 * 1024, // 10 MiB
        }
    }
}

/// Request or response, decided by the first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A client request (`METHOD target HTTP/x.y`).
    Request,
    /// A server response (`HTTP/x.y code phrase`).
    Response,
}

/// One HTTP/1.x message, built incrementally and frozen on completion.
///
/// Byte offsets are absolute within the owning [`Stream`]'s buffer at the
/// time of completion: `start <= header_offset <= body_offset <= end`, the
/// header block (including its terminating empty line) spans
/// `header_offset..body_offset`, and `end == body_offset` when the framing
/// rules give the message no body.
#[derive(Debug, Clone)]
pub struct Message {
    /// Timestamp of the first byte observed for this message.
    pub timestamp_ns: TimestampNs,
    /// Request or response. A stream cut short before its first line parsed
    /// is treated as a response, which downstream drops for having no
    /// matching request.
    pub kind: MessageKind,
    /// HTTP major version; 1 when the version bytes were unparseable.
    pub version_major: u8,
    /// HTTP minor version; 0 when the version bytes were unparseable.
    pub version_minor: u8,
    /// Request method.
    pub method: String,
    /// Request target exactly as sent.
    pub request_target: String,
    /// The raw first line of a request.
    pub first_line: String,
    /// Response status code.
    pub status_code: u16,
    /// Response status phrase: the text after the last space of the status
    /// line remainder.
    pub status_phrase: String,
    /// Retained headers: lower-cased name to value, duplicates joined with
    /// `", "`. Which names are retained is governed by
    /// [`H1Options::header_policy`].
    pub headers: HashMap<String, String>,
    /// Whether a `Content-Length` header was seen.
    pub has_content_length: bool,
    /// Body length: the parsed `Content-Length`, or the accumulated byte
    /// count for chunked and connection-close framed bodies.
    pub content_length: usize,
    /// Trimmed `Transfer-Encoding` value. Chunked framing requires the
    /// exact value `"chunked"` — the comparison is case-sensitive.
    pub transfer_encoding: String,
    /// Trimmed `Connection` value.
    pub connection: String,
    /// Value of the configured client-identifying header, if seen.
    pub client_ip: Option<String>,
    /// Offset of the first byte of the message.
    pub start: usize,
    /// Offset of the first header byte (just past the first line's CRLF).
    pub header_offset: usize,
    /// Offset of the first body byte (just past the empty line).
    pub body_offset: usize,
    /// Offset one past the last byte of the message.
    pub end: usize,
    /// De-chunked body bytes; non-empty only for chunked messages.
    pub chunked_body: Vec<u8>,
}

impl Message {
    /// Create an empty message stamped with the capture time of its first
    /// byte.
    pub fn new(timestamp_ns: TimestampNs) -> Self {
        Self {
            timestamp_ns,
            kind: MessageKind::Response,
            version_major: 0,
            version_minor: 0,
            method: String::new(),
            request_target: String::new(),
            first_line: String::new(),
            status_code: 0,
            status_phrase: String::new(),
            headers: HashMap::new(),
            has_content_length: false,
            content_length: 0,
            transfer_encoding: String::new(),
            connection: String::new(),
            client_ip: None,
            start: 0,
            header_offset: 0,
            body_offset: 0,
            end: 0,
            chunked_body: Vec::new(),
        }
    }

    /// True for requests.
    pub fn is_request(&self) -> bool {
        self.kind == MessageKind::Request
    }

    /// Retained header value by lower-cased name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Parser position within a message.
///
/// Invariant: transitions only move forward within one message —
/// `Start → Headers → {done | BodyFixed | ChunkedLen}`, with the chunked
/// states cycling `ChunkedLen → ChunkedData → ChunkedLen` until the
/// zero-length chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseState {
    /// Waiting for a complete first line.
    Start,
    /// Consuming header fields until the empty line.
    Headers,
    /// Consuming a Content-Length or connection-close framed body.
    BodyFixed,
    /// Waiting for a chunk-size line.
    ChunkedLen,
    /// Consuming one chunk's data plus its trailing CRLF.
    ChunkedData,
    /// Waiting for the CRLF that ends a chunked message.
    ChunkedFinalCrlf,
}

/// Outcome of a [`parse_message`](crate::parse_message) call.
#[derive(Debug)]
pub enum ParseStatus {
    /// The buffer ends mid-message; feed more bytes and call again.
    NeedMore,
    /// One message finished. Take it with
    /// [`Stream::finish_message`] before parsing further.
    Complete,
    /// The stream does not carry parseable HTTP; the caller should discard
    /// this direction's state.
    Invalid(ParseError),
}

/// Classification of stream-fatal parse failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// First line shorter than the 8 bytes any HTTP/1.x first line needs.
    FirstLineTooShort,
    /// Request line does not have three tokens ending in an HTTP version.
    RequestLineMalformed,
    /// Status line remainder carries no space-separated status code.
    StatusLineMalformed,
    /// Chunk-size line does not start with a hex digit.
    ChunkLengthInvalid,
    /// The CRLF that ends a chunked message is missing.
    FinalCrlfMissing,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstLineTooShort => write!(f, "first line too short"),
            Self::RequestLineMalformed => write!(f, "malformed request line"),
            Self::StatusLineMalformed => write!(f, "malformed status line"),
            Self::ChunkLengthInvalid => write!(f, "invalid chunk length"),
            Self::FinalCrlfMissing => write!(f, "expected CRLF sequence at end of message"),
        }
    }
}

/// Stream-fatal parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError {
    /// What went wrong.
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind) -> Self {
        Self { kind }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for ParseError {}

/// Buffer and parse state for one direction of a flow.
///
/// The buffer holds the unconsumed suffix of every byte received so far; it
/// is shrunk from the front only after a message completes.
#[derive(Debug, Default)]
pub struct Stream {
    pub(crate) data:          Vec<u8>,
    pub(crate) parse_offset:  usize,
    pub(crate) state:         ParseState,
    pub(crate) body_received: usize,
    pub(crate) chunk_len:     usize,
    pub(crate) message:       Option<Message>,
}

impl Default for ParseState {
    fn default() -> Self {
        Self::Start
    }
}

impl Stream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append captured payload bytes, allocating the next [`Message`]
    /// stamped with `ts` when none is in flight.
    pub fn feed(&mut self, payload: &[u8], ts: TimestampNs) {
        self.ensure_message(ts);
        self.data.extend_from_slice(payload);
    }

    /// Allocate the next message when none is in flight — after a completed
    /// message was taken, pipelined bytes may already be buffered.
    pub fn ensure_message(&mut self, ts: TimestampNs) {
        if self.message.is_none() {
            self.message = Some(Message::new(ts));
        }
    }

    /// Total buffered bytes.
    pub fn buffered(&self) -> usize {
        self.data.len()
    }

    /// The message currently being built, if any.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Take the completed message together with its raw `start..end` bytes,
    /// shift the buffer past it, and reset for the next message.
    ///
    /// Call only after [`parse_message`](crate::parse_message) returned
    /// [`ParseStatus::Complete`]; returns `None` when no message is in
    /// flight.
    pub fn finish_message(&mut self) -> Option<(Message, Vec<u8>)> {
        let msg = self.message.take()?;
        let raw = self.data[msg.start..msg.end].to_vec();
        self.data.drain(..msg.end);
        self.reset_parse();
        Some((msg, raw))
    }

    /// Close out a mid-parse message because the connection ended: every
    /// buffered byte from `start` on becomes part of the message (the
    /// HTTP/1.0 connection-close framing case). Returns `None` when nothing
    /// was buffered past the message start.
    pub fn finish_at_close(&mut self) -> Option<(Message, Vec<u8>)> {
        if self
            .message
            .as_ref()
            .is_none_or(|m| self.data.len() <= m.start)
        {
            return None;
        }
        let mut msg = self.message.take()?;
        msg.end = self.data.len();
        let raw = self.data[msg.start..].to_vec();
        self.data.clear();
        self.reset_parse();
        Some((msg, raw))
    }

    fn reset_parse(&mut self) {
        self.parse_offset = 0;
        self.state = ParseState::Start;
        self.body_received = 0;
        self.chunk_len = 0;
    }
}
