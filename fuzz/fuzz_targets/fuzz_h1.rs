//! Fuzz target: HTTP/1.x message parsing
//!
//! Feeds random bytes to the incremental parser, whole and as a prefix.
//! The goal is to ensure the parser never panics on arbitrary input.

#![no_main]

use h1session::{H1Options, HeaderPolicy, ParseStatus, Stream, TimestampNs, parse_message};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let opts = H1Options {
        header_policy: HeaderPolicy::All,
        client_ip_header: Some("x-forwarded-for".to_string()),
        ..H1Options::default()
    };

    let mut stream = Stream::new();
    stream.feed(data, TimestampNs(0));
    loop {
        match parse_message(&mut stream, &opts) {
            ParseStatus::Complete => {
                if stream.finish_message().is_none() {
                    break;
                }
                stream.ensure_message(TimestampNs(0));
            }
            _ => break,
        }
    }
    let _ = stream.finish_at_close();

    // Incremental: a prefix must not panic either.
    if data.len() > 10 {
        let mut stream = Stream::new();
        stream.feed(&data[..data.len() / 2], TimestampNs(0));
        let _ = parse_message(&mut stream, &opts);
    }
});
