//! Analyzer configuration.
//!
//! The host binary deserializes this from its own configuration file and
//! passes it in once; it is never mutated afterwards.

use std::collections::HashSet;

use h1session::{H1Options, HeaderPolicy};
use serde::Deserialize;

/// HTTP analyzer configuration. Every field has a default, so an absent
/// section deserializes to [`HttpConfig::default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Include the redacted raw request in emitted records.
    pub send_request: bool,
    /// Include the raw response in emitted records.
    pub send_response: bool,
    /// Record every header.
    pub send_all_headers: bool,
    /// Headers to record (matched lower-cased). Ignored when
    /// `send_all_headers` is set.
    pub send_headers: Vec<String>,
    /// Split `Cookie` / `Set-Cookie` values into name/value maps in the
    /// recorded headers.
    pub split_cookie: bool,
    /// Header carrying the real client address behind a proxy (e.g.
    /// `X-Forwarded-For`); its value lands in the record's `real_ip`.
    pub real_ip_header: String,
    /// Content-type substrings whose message bodies are kept in the raw
    /// record fields. Anything else is truncated at the end of the headers.
    pub include_body_for: Vec<String>,
    /// Credential scrubbing knobs.
    pub passwords: PasswordsConfig,
    /// Buffered-byte cap per stream direction; exceeding it drops the
    /// direction's stream.
    pub max_stream_buffer: usize,
    /// Seconds a request may wait for its response before the pending
    /// transaction is expired.
    pub transaction_timeout_secs: u64,
}

/// Credential scrubbing configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordsConfig {
    /// Form keywords (e.g. `password=`) whose values are starred out in
    /// urlencoded request bodies.
    pub hide_keywords: Vec<String>,
    /// Star out `Authorization` header values in requests.
    pub strip_authorization: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            send_request: true,
            send_response: true,
            send_all_headers: false,
            send_headers: Vec::new(),
            split_cookie: false,
            real_ip_header: String::new(),
            include_body_for: Vec::new(),
            passwords: PasswordsConfig::default(),
            max_stream_buffer: 10 * 1024 * 1024, // 10 MiB
            transaction_timeout_secs: 10,
        }
    }
}

impl HttpConfig {
    /// Whether any headers are recorded at all.
    pub(crate) fn send_headers_enabled(&self) -> bool {
        self.send_all_headers || !self.send_headers.is_empty()
    }

    /// Header retention policy for the parser.
    pub fn header_policy(&self) -> HeaderPolicy {
        if self.send_all_headers {
            HeaderPolicy::All
        } else if !self.send_headers.is_empty() {
            HeaderPolicy::Allowlist(
                self.send_headers
                    .iter()
                    .map(|h| h.to_ascii_lowercase())
                    .collect::<HashSet<_>>(),
            )
        } else {
            HeaderPolicy::None
        }
    }

    /// Parser options derived from this configuration.
    pub fn h1_options(&self) -> H1Options {
        H1Options {
            header_policy: self.header_policy(),
            client_ip_header: if self.real_ip_header.is_empty() {
                None
            } else {
                Some(self.real_ip_header.to_ascii_lowercase())
            },
            max_buffer_size: self.max_stream_buffer,
        }
    }

    pub(crate) fn timeout_ns(&self) -> u64 {
        self.transaction_timeout_secs * 1_000_000_000
    }
}
