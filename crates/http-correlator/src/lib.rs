//! HTTP transaction correlation for passively captured traffic.
//!
//! Sits between a TCP reassembler and a record sink: the reassembler hands
//! in ordered payload segments per flow direction, this crate reconstructs
//! HTTP/1.x messages with [`h1session`], pairs each request with the
//! response that follows on the same flow, scrubs credentials, and emits one
//! structured [`TransactionRecord`] per pair.
//!
//! # Usage
//!
//! Implement [`ProcessTable`] for your process lookup (or use
//! [`NoProcessTable`]), pick a [`TransactionSink`] — an
//! `tokio::sync::mpsc::UnboundedSender<TransactionRecord>` works as is —
//! and feed reassembler events to an [`HttpAnalyzer`]:
//!
//! ```
//! use http_correlator::{
//!     Direction, FlowKey, FlowState, HttpAnalyzer, HttpConfig, NoProcessTable,
//!     TimestampNs, TransactionRecord,
//! };
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<TransactionRecord>();
//! let mut analyzer = HttpAnalyzer::new(HttpConfig::default(), NoProcessTable, Some(tx));
//!
//! let flow = FlowKey::new("10.0.0.1".parse().unwrap(), 34000, "10.0.0.2".parse().unwrap(), 80);
//! let mut state = FlowState::new();
//!
//! analyzer.on_segment(
//!     &flow,
//!     Direction::Originator,
//!     b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n",
//!     TimestampNs(1_000),
//!     &mut state,
//! );
//! analyzer.on_segment(
//!     &flow,
//!     Direction::Responder,
//!     b"HTTP/1.1 204 No Content\r\n\r\n",
//!     TimestampNs(2_000_000),
//!     &mut state,
//! );
//!
//! let record = rx.try_recv().unwrap();
//! assert_eq!(record.http.code, 204);
//! ```
//!
//! # Concurrency
//!
//! All state for a flow is touched only while the owning worker holds the
//! flow's [`FlowState`]; there is no internal locking. Hosts that spread
//! flows over several workers must shard by [`FlowKey::symmetric_hash`] so
//! each flow lives on exactly one worker. Transaction timeouts are a delay
//! queue drained on that same worker — at the top of every
//! [`on_segment`](HttpAnalyzer::on_segment), and on demand via
//! [`expire_transactions`](HttpAnalyzer::expire_transactions) for hosts with
//! idle flows.

mod config;
mod flow;
mod record;
mod redact;
mod traits;
mod transaction;

#[cfg(test)]
mod tests;

pub use config::{HttpConfig, PasswordsConfig};
pub use flow::{Direction, FlowHash, FlowKey, FlowState};
pub use h1session::{Message, MessageKind, TimestampNs};
pub use record::{Endpoint, HeaderValue, HttpDetail, RecordHeaders, TransactionRecord};
pub use traits::{NoProcessTable, ProcessPair, ProcessTable, TransactionSink};

use h1session::{H1Options, ParseStatus, Stream, parse_message};
use tracing::{debug, warn};

use crate::record::{cut_message_body, record_headers, status_of};
use crate::redact::censor_credentials;
use crate::transaction::{PendingTransaction, TransactionTable};

/// The HTTP protocol analyzer: reassembler-facing entry points on top of
/// per-flow parsing, correlation, and publishing.
///
/// Every entry point returns normally; parse failures cost at most the
/// affected direction's stream and are logged, never propagated.
pub struct HttpAnalyzer<P, S> {
    config:       HttpConfig,
    options:      H1Options,
    transactions: TransactionTable,
    procs:        P,
    sink:         Option<S>,
}

impl<P: ProcessTable, S: TransactionSink> HttpAnalyzer<P, S> {
    /// Build an analyzer. With no sink, completed transactions are silently
    /// discarded.
    pub fn new(config: HttpConfig, procs: P, sink: Option<S>) -> Self {
        let options = config.h1_options();
        let transactions = TransactionTable::new(config.timeout_ns());
        Self {
            config,
            options,
            transactions,
            procs,
            sink,
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// Feed one in-order payload segment for a flow direction.
    ///
    /// Appends to the direction's buffer and drives the parser until it
    /// needs more data. Each completed message is redacted and dispatched;
    /// pipelined messages in one segment dispatch in order. A parse failure
    /// or a buffer over the configured cap drops this direction's stream
    /// and nothing else.
    pub fn on_segment(
        &mut self,
        flow: &FlowKey,
        dir: Direction,
        payload: &[u8],
        ts: TimestampNs,
        state: &mut FlowState,
    ) {
        self.transactions.expire(ts);

        let slot = &mut state.streams[dir.index()];
        let stream = slot.get_or_insert_with(Stream::new);
        stream.feed(payload, ts);

        if stream.buffered() > self.options.max_buffer_size {
            warn!(%flow, buffered = stream.buffered(), "stream data too large, dropping stream");
            *slot = None;
            return;
        }

        let mut drop_stream = false;
        loop {
            match parse_message(stream, &self.options) {
                ParseStatus::NeedMore => break,
                ParseStatus::Invalid(err) => {
                    warn!(%flow, error = %err, "dropping stream, will retry with the next segment");
                    drop_stream = true;
                    break;
                }
                ParseStatus::Complete => {
                    let Some((mut msg, mut raw)) = stream.finish_message() else {
                        break;
                    };
                    censor_credentials(&self.config.passwords, &mut msg, &mut raw);
                    self.dispatch(flow, dir, msg, &raw);
                    // The buffer may hold the start of a pipelined message.
                    stream.ensure_message(ts);
                }
            }
        }
        if drop_stream {
            *slot = None;
        }
    }

    /// The reassembler saw this direction's FIN.
    ///
    /// A message still mid-parse with buffered bytes is shipped as complete
    /// — this is how a connection-close framed HTTP/1.0 body terminates.
    pub fn on_fin(&mut self, flow: &FlowKey, dir: Direction, state: &mut FlowState) {
        let Some(stream) = state.streams[dir.index()].as_mut() else {
            return;
        };
        if let Some((mut msg, mut raw)) = stream.finish_at_close() {
            debug!(%flow, "publishing message on connection FIN");
            censor_credentials(&self.config.passwords, &mut msg, &mut raw);
            self.dispatch(flow, dir, msg, &raw);
        }
    }

    /// The reassembler lost bytes on this direction. Parse state is left
    /// untouched; the next segment will most likely invalidate the stream
    /// and recovery starts from there.
    pub fn on_gap(&mut self, _flow: &FlowKey, _dir: Direction, _state: &mut FlowState) {}

    /// Drain due transaction timeouts. `on_segment` calls this with each
    /// segment's timestamp; hosts should also call it periodically so flows
    /// that went quiet still expire. Returns the number of expired entries.
    pub fn expire_transactions(&mut self, now: TimestampNs) -> usize {
        self.transactions.expire(now)
    }

    fn dispatch(&mut self, flow: &FlowKey, dir: Direction, msg: Message, raw: &[u8]) {
        let hash = flow.symmetric_hash();
        match msg.kind {
            MessageKind::Request => self.request_complete(flow, dir, hash, msg, raw),
            MessageKind::Response => self.response_complete(hash, msg, raw),
        }
    }

    fn request_complete(
        &mut self,
        flow: &FlowKey,
        dir: Direction,
        hash: FlowHash,
        msg: Message,
        raw: &[u8],
    ) {
        let procs = self.procs.lookup(flow);
        let mut src = Endpoint {
            ip:   flow.src_ip.to_string(),
            port: flow.src_port,
            proc: procs.src,
        };
        let mut dst = Endpoint {
            ip:   flow.dst_ip.to_string(),
            port: flow.dst_port,
            proc: procs.dst,
        };
        // Keep src as the client even when the request traveled on the
        // direction labeled Responder.
        if dir == Direction::Responder {
            std::mem::swap(&mut src, &mut dst);
        }

        let request_raw = self.config.send_request.then(|| {
            String::from_utf8_lossy(&cut_message_body(&self.config.include_body_for, &msg, raw))
                .into_owned()
        });
        let request_headers = self
            .config
            .send_headers_enabled()
            .then(|| record_headers(&msg, self.config.split_cookie, "cookie"));

        self.transactions.register_request(
            hash,
            PendingTransaction {
                seq: 0,
                ts: msg.timestamp_ns,
                method: msg.method,
                path: msg.request_target,
                src,
                dst,
                request_raw,
                request_headers,
                real_ip: msg.client_ip.filter(|v| !v.is_empty()),
            },
        );
    }

    fn response_complete(&mut self, hash: FlowHash, msg: Message, raw: &[u8]) {
        let Some(txn) = self.transactions.take(&hash) else {
            warn!("response without a known request, ignoring");
            return;
        };

        let response_raw = self.config.send_response.then(|| {
            String::from_utf8_lossy(&cut_message_body(&self.config.include_body_for, &msg, raw))
                .into_owned()
        });
        let response_headers = self
            .config
            .send_headers_enabled()
            .then(|| record_headers(&msg, self.config.split_cookie, "set-cookie"));

        let record = TransactionRecord {
            event_type: "http",
            status: status_of(msg.status_code),
            response_time_ms: msg.timestamp_ns.saturating_sub(txn.ts) / 1_000_000,
            method: txn.method,
            path: txn.path,
            http: HttpDetail {
                code: msg.status_code,
                phrase: msg.status_phrase,
                content_length: msg.content_length,
                request_headers: txn.request_headers,
                response_headers,
            },
            request_raw: txn.request_raw,
            response_raw,
            real_ip: txn.real_ip,
            src: txn.src,
            dst: txn.dst,
            timestamp: txn.ts.0,
        };

        match &self.sink {
            Some(sink) => sink.deliver(record),
            None => debug!("no sink configured, discarding transaction record"),
        }
    }
}
