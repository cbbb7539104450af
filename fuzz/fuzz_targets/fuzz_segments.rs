//! Fuzz target: segmentation invariance through the analyzer
//!
//! Drives the full analyzer with the same bytes delivered whole and split
//! at a fuzzer-chosen point, and checks that the emitted transactions
//! match.

#![no_main]

use http_correlator::{
    Direction, FlowKey, FlowState, HttpAnalyzer, HttpConfig, NoProcessTable, TimestampNs,
    TransactionRecord,
};
use libfuzzer_sys::fuzz_target;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

fn run(segments: &[&[u8]]) -> Vec<TransactionRecord> {
    let (tx, mut rx) = unbounded_channel();
    let mut analyzer: HttpAnalyzer<NoProcessTable, UnboundedSender<TransactionRecord>> =
        HttpAnalyzer::new(HttpConfig::default(), NoProcessTable, Some(tx));
    let flow = FlowKey::new(
        "10.0.0.1".parse().unwrap(),
        12345,
        "10.0.0.2".parse().unwrap(),
        80,
    );
    let mut state = FlowState::new();

    // A canned request so fuzzer-supplied response bytes can pair.
    analyzer.on_segment(
        &flow,
        Direction::Originator,
        b"GET / HTTP/1.1\r\nHost: a\r\n\r\n",
        TimestampNs(0),
        &mut state,
    );
    for segment in segments {
        analyzer.on_segment(&flow, Direction::Responder, segment, TimestampNs(1), &mut state);
    }
    analyzer.on_fin(&flow, Direction::Responder, &mut state);

    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

fuzz_target!(|input: (&[u8], usize)| {
    let (data, cut) = input;
    if data.is_empty() {
        return;
    }
    let cut = cut % data.len();

    let whole = run(&[data]);
    let split = run(&[&data[..cut], &data[cut..]]);
    assert_eq!(whole, split);
});
