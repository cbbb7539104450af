use std::collections::HashMap;

use h1session::{H1Options, HeaderPolicy, Message, ParseStatus, Stream, TimestampNs, parse_message};
use rstest::rstest;

use crate::config::{HttpConfig, PasswordsConfig};
use crate::flow::{FlowKey, FlowState};
use crate::record::{
    Endpoint, HeaderValue, cut_message_body, split_cookies_header, status_of,
};
use crate::redact::censor_credentials;
use crate::transaction::{PendingTransaction, TransactionTable};

fn flow() -> FlowKey {
    FlowKey::new(
        "192.168.0.1".parse().unwrap(),
        6512,
        "192.168.0.2".parse().unwrap(),
        80,
    )
}

/// Parse one complete request with every header retained.
fn parse_request(input: &[u8]) -> (Message, Vec<u8>) {
    let opts = H1Options {
        header_policy: HeaderPolicy::All,
        ..H1Options::default()
    };
    let mut stream = Stream::new();
    stream.feed(input, TimestampNs(0));
    match parse_message(&mut stream, &opts) {
        ParseStatus::Complete => stream.finish_message().unwrap(),
        other => panic!("expected Complete, got {other:?}"),
    }
}

fn pending(ts: u64) -> PendingTransaction {
    PendingTransaction {
        seq: 0,
        ts: TimestampNs(ts),
        method: "GET".to_string(),
        path: "/".to_string(),
        src: Endpoint::default(),
        dst: Endpoint::default(),
        request_raw: None,
        request_headers: None,
        real_ip: None,
    }
}

// =========================================================================
// flow identity
// =========================================================================

#[test]
fn test_symmetric_hash_matches_both_orientations() {
    let forward = flow();
    let reverse = FlowKey::new(
        forward.dst_ip,
        forward.dst_port,
        forward.src_ip,
        forward.src_port,
    );
    assert_eq!(forward.symmetric_hash(), reverse.symmetric_hash());

    let other = FlowKey::new(forward.src_ip, 6513, forward.dst_ip, 80);
    assert_ne!(forward.symmetric_hash(), other.symmetric_hash());
}

#[test]
fn test_fresh_flow_state_is_idle() {
    let state = FlowState::new();
    assert!(state.is_idle());
}

// =========================================================================
// configuration
// =========================================================================

#[test]
fn test_config_defaults() {
    let config = HttpConfig::default();
    assert!(config.send_request);
    assert!(config.send_response);
    assert!(!config.send_all_headers);
    assert!(config.send_headers.is_empty());
    assert_eq!(config.transaction_timeout_secs, 10);
    assert_eq!(config.max_stream_buffer, 10 * 1024 * 1024);
}

#[test]
fn test_header_policy_derivation() {
    let config = HttpConfig::default();
    assert!(matches!(config.header_policy(), HeaderPolicy::None));

    let config = HttpConfig {
        send_all_headers: true,
        ..HttpConfig::default()
    };
    assert!(matches!(config.header_policy(), HeaderPolicy::All));

    let config = HttpConfig {
        send_headers: vec!["Host".to_string(), "User-Agent".to_string()],
        ..HttpConfig::default()
    };
    match config.header_policy() {
        HeaderPolicy::Allowlist(names) => {
            assert!(names.contains("host"));
            assert!(names.contains("user-agent"));
        }
        other => panic!("expected allowlist, got {other:?}"),
    }
}

#[test]
fn test_real_ip_header_lowercased_into_options() {
    let config = HttpConfig {
        real_ip_header: "X-Forwarded-For".to_string(),
        ..HttpConfig::default()
    };
    assert_eq!(
        config.h1_options().client_ip_header.as_deref(),
        Some("x-forwarded-for")
    );
    assert_eq!(HttpConfig::default().h1_options().client_ip_header, None);
}

// =========================================================================
// record assembly
// =========================================================================

#[test]
fn test_status_classification() {
    assert_eq!(status_of(204), "OK");
    assert_eq!(status_of(399), "OK");
    assert_eq!(status_of(400), "ERROR");
    assert_eq!(status_of(503), "ERROR");
}

#[rstest]
#[case("a=1; b=2", &[("a", "1"), ("b", "2")])]
#[case("SID=x2f; Path=/", &[("sid", "x2f"), ("path", "/")])]
#[case("lone", &[])]
#[case("k=v=w", &[("k", "v")])]
fn test_split_cookies_header(#[case] value: &str, #[case] expected: &[(&str, &str)]) {
    let cookies = split_cookies_header(value);
    assert_eq!(cookies.len(), expected.len());
    for (name, val) in expected {
        assert_eq!(cookies.get(*name).map(String::as_str), Some(*val));
    }
}

#[test]
fn test_cut_message_body_truncates_without_content_type() {
    let (msg, raw) = parse_request(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nBODY");
    let cut = cut_message_body(&["text".to_string()], &msg, &raw);
    assert!(cut.ends_with(b"\r\n\r\n"));
    assert_eq!(cut.len(), msg.body_offset - msg.start);
}

#[test]
fn test_cut_message_body_keeps_matching_content_type() {
    let (msg, raw) = parse_request(
        b"POST / HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 4\r\n\r\nBODY",
    );
    let cut = cut_message_body(&["text".to_string()], &msg, &raw);
    assert!(cut.ends_with(b"BODY"));

    let cut = cut_message_body(&["json".to_string()], &msg, &raw);
    assert!(cut.ends_with(b"\r\n\r\n"), "non-matching content type drops the body");

    let cut = cut_message_body(&[], &msg, &raw);
    assert!(cut.ends_with(b"\r\n\r\n"), "empty include list drops the body");
}

#[test]
fn test_cut_message_body_uses_assembled_chunks() {
    let opts = H1Options {
        header_policy: HeaderPolicy::All,
        ..H1Options::default()
    };
    let mut stream = Stream::new();
    stream.feed(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
        TimestampNs(0),
    );
    assert!(matches!(parse_message(&mut stream, &opts), ParseStatus::Complete));
    let (msg, raw) = stream.finish_message().unwrap();

    let cut = cut_message_body(&["text".to_string()], &msg, &raw);
    assert!(cut.ends_with(b"hello"), "assembled body, not wire chunks");
    assert!(!cut.windows(3).any(|w| w == b"5\r\n"));
}

#[test]
fn test_record_serialization_field_names() {
    use crate::record::{HttpDetail, TransactionRecord};

    let record = TransactionRecord {
        event_type: "http",
        status: "OK",
        response_time_ms: 12,
        method: "GET".to_string(),
        path: "/x".to_string(),
        http: HttpDetail {
            code: 200,
            phrase: "OK".to_string(),
            content_length: 0,
            request_headers: None,
            response_headers: None,
        },
        request_raw: None,
        response_raw: None,
        real_ip: None,
        src: Endpoint::default(),
        dst: Endpoint::default(),
        timestamp: 99,
    };

    let json: serde_json::Value = serde_json::to_value(&record).unwrap();
    assert_eq!(json["type"], "http");
    assert_eq!(json["responsetime"], 12);
    assert_eq!(json["http"]["code"], 200);
    assert!(json.get("request_raw").is_none(), "absent optionals are omitted");
    assert!(json.get("real_ip").is_none());
}

#[test]
fn test_header_value_serialization() {
    let text = serde_json::to_value(HeaderValue::Text("x".to_string())).unwrap();
    assert_eq!(text, "x");

    let pairs = serde_json::to_value(HeaderValue::Pairs(HashMap::from([(
        "sid".to_string(),
        "1".to_string(),
    )])))
    .unwrap();
    assert_eq!(pairs["sid"], "1");
}

// =========================================================================
// redaction
// =========================================================================

fn strip_auth() -> PasswordsConfig {
    PasswordsConfig {
        hide_keywords: Vec::new(),
        strip_authorization: true,
    }
}

#[test]
fn test_authorization_value_starred_out() {
    let (mut msg, mut raw) = parse_request(
        b"GET / HTTP/1.1\r\nHost: a\r\nAuthorization: Basic dXNlcjpwYXNz\r\n\r\n",
    );
    censor_credentials(&strip_auth(), &mut msg, &mut raw);

    let expected_stars = " Basic dXNlcjpwYXNz".len();
    let text = String::from_utf8_lossy(&raw);
    assert!(
        text.contains(&format!("Authorization:{}\r\n", "*".repeat(expected_stars))),
        "got: {text}"
    );
    assert_eq!(msg.header("authorization"), Some("*"));
    assert!(!raw.windows(4).any(|w| w == b"dXNl"));
}

#[test]
fn test_authorization_untouched_when_not_configured() {
    let (mut msg, mut raw) = parse_request(
        b"GET / HTTP/1.1\r\nAuthorization: Basic dXNlcjpwYXNz\r\n\r\n",
    );
    censor_credentials(&PasswordsConfig::default(), &mut msg, &mut raw);
    assert!(raw.windows(4).any(|w| w == b"dXNl"));
    assert_eq!(msg.header("authorization"), Some("Basic dXNlcjpwYXNz"));
}

#[test]
fn test_authorization_untouched_when_header_not_retained() {
    // Selection policy dropped the header from the map, so the pass is
    // skipped even though stripping is configured.
    let mut stream = Stream::new();
    stream.feed(
        b"GET / HTTP/1.1\r\nAuthorization: Basic dXNlcjpwYXNz\r\n\r\n",
        TimestampNs(0),
    );
    assert!(matches!(
        parse_message(&mut stream, &H1Options::default()),
        ParseStatus::Complete
    ));
    let (mut msg, mut raw) = stream.finish_message().unwrap();
    censor_credentials(&strip_auth(), &mut msg, &mut raw);
    assert!(raw.windows(4).any(|w| w == b"dXNl"));
}

fn hide_password() -> PasswordsConfig {
    PasswordsConfig {
        hide_keywords: vec!["password=".to_string()],
        strip_authorization: false,
    }
}

fn form_request(body: &str) -> Vec<u8> {
    let mut req = format!(
        "POST /login HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    req.extend_from_slice(body.as_bytes());
    req
}

#[test]
fn test_form_password_value_starred_out() {
    let (mut msg, mut raw) = parse_request(&form_request("user=bob&password=secret&x=1"));
    censor_credentials(&hide_password(), &mut msg, &mut raw);
    assert!(
        String::from_utf8_lossy(&raw).ends_with("user=bob&password=******&x=1"),
        "got: {}",
        String::from_utf8_lossy(&raw)
    );
}

#[test]
fn test_form_keyword_at_body_start_is_redacted() {
    let (mut msg, mut raw) = parse_request(&form_request("password=secret&x=1"));
    censor_credentials(&hide_password(), &mut msg, &mut raw);
    assert!(String::from_utf8_lossy(&raw).ends_with("password=******&x=1"));
}

#[test]
fn test_form_value_without_delimiter_runs_to_message_end() {
    let (mut msg, mut raw) = parse_request(&form_request("password=secret"));
    censor_credentials(&hide_password(), &mut msg, &mut raw);
    assert!(String::from_utf8_lossy(&raw).ends_with("password=******"));
}

#[test]
fn test_oversized_form_value_left_alone() {
    let huge = "x".repeat(150);
    let (mut msg, mut raw) = parse_request(&form_request(&format!("password={huge}")));
    censor_credentials(&hide_password(), &mut msg, &mut raw);
    assert!(!raw.contains(&b'*'), "spans of 120+ bytes are not redacted");
}

#[test]
fn test_form_pass_skipped_without_urlencoded_content_type() {
    let body = "password=secret";
    let mut input = format!(
        "POST / HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    input.extend_from_slice(body.as_bytes());
    let (mut msg, mut raw) = parse_request(&input);
    censor_credentials(&hide_password(), &mut msg, &mut raw);
    assert!(!raw.contains(&b'*'));
}

#[test]
fn test_responses_are_never_redacted() {
    let opts = H1Options {
        header_policy: HeaderPolicy::All,
        ..H1Options::default()
    };
    let mut stream = Stream::new();
    stream.feed(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 15\r\n\r\npassword=secret",
        TimestampNs(0),
    );
    assert!(matches!(parse_message(&mut stream, &opts), ParseStatus::Complete));
    let (mut msg, mut raw) = stream.finish_message().unwrap();
    censor_credentials(&hide_password(), &mut msg, &mut raw);
    assert!(raw.ends_with(b"password=secret"));
}

// =========================================================================
// transaction table
// =========================================================================

#[test]
fn test_register_and_take() {
    let mut table = TransactionTable::new(10_000_000_000);
    let hash = flow().symmetric_hash();
    table.register_request(hash, pending(100));
    assert_eq!(table.len(), 1);
    let txn = table.take(&hash).unwrap();
    assert_eq!(txn.ts, TimestampNs(100));
    assert!(table.take(&hash).is_none());
}

#[test]
fn test_second_request_overwrites_pending() {
    let mut table = TransactionTable::new(10_000_000_000);
    let hash = flow().symmetric_hash();
    table.register_request(hash, pending(100));
    let mut second = pending(200);
    second.path = "/second".to_string();
    table.register_request(hash, second);

    assert_eq!(table.len(), 1);
    assert_eq!(table.get(&hash).unwrap().path, "/second");
}

#[test]
fn test_expire_removes_timed_out_entries() {
    let mut table = TransactionTable::new(10_000_000_000);
    let hash = flow().symmetric_hash();
    table.register_request(hash, pending(1_000));

    assert_eq!(table.expire(TimestampNs(10_000_000_000)), 0, "not due yet");
    assert_eq!(table.expire(TimestampNs(10_000_001_000)), 1);
    assert_eq!(table.len(), 0);

    // A late firing for an already-expired entry finds nothing.
    assert_eq!(table.expire(TimestampNs(20_000_001_000)), 0);
}

#[test]
fn test_stale_deadline_cannot_evict_a_newer_entry() {
    let mut table = TransactionTable::new(10_000_000_000);
    let hash = flow().symmetric_hash();
    table.register_request(hash, pending(1_000));
    // Overwritten before its response: the first deadline is now stale.
    table.register_request(hash, pending(8_000_000_000));

    // The first entry's deadline comes due but must not evict the second.
    assert_eq!(table.expire(TimestampNs(10_000_002_000)), 0);
    assert_eq!(table.len(), 1);

    // The second entry expires at its own deadline.
    assert_eq!(table.expire(TimestampNs(18_000_000_001)), 1);
}

#[test]
fn test_pairing_cancels_the_deadline() {
    let mut table = TransactionTable::new(10_000_000_000);
    let hash = flow().symmetric_hash();
    table.register_request(hash, pending(1_000));
    table.take(&hash).unwrap();

    // The deadline fires into a void.
    assert_eq!(table.expire(TimestampNs(10_000_002_000)), 0);
}
