//! The emitted transaction record and its assembly helpers.

use std::collections::HashMap;

use h1session::Message;
use serde::Serialize;

pub(crate) const OK_STATUS: &str = "OK";
pub(crate) const ERROR_STATUS: &str = "ERROR";

/// Coarse status classification: client and server errors are `ERROR`,
/// everything below 400 is `OK`.
pub(crate) fn status_of(code: u16) -> &'static str {
    if code < 400 { OK_STATUS } else { ERROR_STATUS }
}

/// One end of a transaction, with the owning process name when the process
/// table knows it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub ip:   String,
    pub port: u16,
    pub proc: String,
}

/// A recorded header value: the plain wire value, or cookie pairs when
/// `split_cookie` is enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Text(String),
    Pairs(HashMap<String, String>),
}

/// Recorded headers: lower-cased name to value.
pub type RecordHeaders = HashMap<String, HeaderValue>;

/// The HTTP sub-record of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpDetail {
    pub code: u16,
    pub phrase: String,
    pub content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<RecordHeaders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<RecordHeaders>,
}

/// A completed request/response pair, ready for the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// `"OK"` or `"ERROR"`, from the response status code.
    pub status: &'static str,
    /// Response time in whole milliseconds.
    #[serde(rename = "responsetime")]
    pub response_time_ms: u64,
    pub method: String,
    pub path: String,
    pub http: HttpDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_ip: Option<String>,
    /// Client end of the transaction.
    pub src: Endpoint,
    /// Server end of the transaction.
    pub dst: Endpoint,
    /// Request timestamp, nanoseconds since epoch.
    pub timestamp: u64,
}

/// Build the recorded header map for a message, splitting the named cookie
/// header (`cookie` for requests, `set-cookie` for responses) into pairs
/// when enabled.
pub(crate) fn record_headers(
    msg: &Message,
    split_cookie: bool,
    cookie_header: &str,
) -> RecordHeaders {
    msg.headers
        .iter()
        .map(|(name, value)| {
            let recorded = if split_cookie && name == cookie_header {
                HeaderValue::Pairs(split_cookies_header(value))
            } else {
                HeaderValue::Text(value.clone())
            };
            (name.clone(), recorded)
        })
        .collect()
}

/// Split a cookie header value on `;`, then each fragment on `=`. Names are
/// lower-cased and space-trimmed; fragments without a `=` are skipped.
pub(crate) fn split_cookies_header(value: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for fragment in value.split(';') {
        let mut parts = fragment.split('=');
        let name = parts.next().unwrap_or_default();
        let Some(val) = parts.next() else { continue };
        cookies.insert(name.trim_matches(' ').to_ascii_lowercase(), val.to_string());
    }
    cookies
}

/// Raw bytes destined for a record's `request_raw` / `response_raw`: the
/// header block always; the body only when a content-type header was
/// retained and is either empty or matches one of the `include_body_for`
/// substrings. Chunked messages contribute their assembled body instead of
/// the wire chunks.
pub(crate) fn cut_message_body(include_body_for: &[String], msg: &Message, raw: &[u8]) -> Vec<u8> {
    let header_end = msg
        .body_offset
        .saturating_sub(msg.start)
        .min(raw.len());
    let mut cut = raw[..header_end].to_vec();

    match msg.header("content-type") {
        Some(content_type)
            if content_type.is_empty() || should_include_body(include_body_for, content_type) =>
        {
            if !msg.chunked_body.is_empty() {
                cut.extend_from_slice(&msg.chunked_body);
            } else {
                cut.extend_from_slice(&raw[header_end..]);
            }
        }
        _ => {}
    }

    cut
}

fn should_include_body(include_body_for: &[String], content_type: &str) -> bool {
    include_body_for
        .iter()
        .any(|substring| content_type.contains(substring.as_str()))
}
