//! Credential scrubbing over raw request bytes.
//!
//! Runs in the emission path, after a request completes and before anything
//! downstream can observe its bytes. The raw slice is mutated in place;
//! offsets from the [`Message`] are rebased onto it.

use h1session::Message;
use h1session::scan::find_crlf;

use crate::config::PasswordsConfig;

const AUTHORIZATION_LITERAL: &[u8] = b"Authorization:";

/// Value spans at least this long are left alone; a missing delimiter would
/// otherwise star out an arbitrarily large blob.
const REDACTED_SPAN_MAX: usize = 120;

/// Scrub credentials from a request's raw bytes and header map. Responses
/// pass through untouched.
pub(crate) fn censor_credentials(passwords: &PasswordsConfig, msg: &mut Message, raw: &mut [u8]) {
    if !msg.is_request() {
        return;
    }

    // Base64 is not encryption: star out Basic/Bearer credentials wholesale.
    // Gated on the header having been retained in the map, so the selection
    // policy must include it.
    if passwords.strip_authorization
        && msg.header("authorization").is_some_and(|v| !v.is_empty())
    {
        strip_authorization_header(msg, raw);
    }

    if msg.content_length > 0
        && msg
            .header("content-type")
            .is_some_and(|ct| ct.contains("urlencoded"))
    {
        for keyword in &passwords.hide_keywords {
            censor_form_value(keyword.as_bytes(), msg, raw);
        }
    }
}

fn strip_authorization_header(msg: &mut Message, raw: &mut [u8]) {
    let header_start = msg.header_offset.saturating_sub(msg.start).min(raw.len());
    let header_end = msg.body_offset.saturating_sub(msg.start).min(raw.len());
    let header_block = &raw[header_start..header_end];

    let Some(literal_at) = find(header_block, AUTHORIZATION_LITERAL) else {
        return;
    };
    let value_start = literal_at + AUTHORIZATION_LITERAL.len();
    let value_end = find_crlf(header_block, literal_at).unwrap_or(header_block.len());
    if value_end < value_start {
        return;
    }

    for b in &mut raw[header_start + value_start..header_start + value_end] {
        *b = b'*';
    }
    msg.headers.insert("authorization".to_string(), "*".to_string());
}

/// Star out the value following the first occurrence of `keyword` in the
/// body, up to the first of `&`, SP, CR, LF or the end of the message.
fn censor_form_value(keyword: &[u8], msg: &Message, raw: &mut [u8]) {
    let body_start = msg.body_offset.saturating_sub(msg.start).min(raw.len());
    let Some(keyword_at) = find(&raw[body_start..], keyword) else {
        return;
    };

    let value_start = body_start + keyword_at + keyword.len();
    let value_end = raw[value_start..]
        .iter()
        .position(|&b| matches!(b, b'&' | b' ' | b'\r' | b'\n'))
        .map_or(raw.len(), |p| value_start + p);

    if value_end - value_start < REDACTED_SPAN_MAX {
        for b in &mut raw[value_start..value_end] {
            *b = b'*';
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
