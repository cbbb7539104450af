//! Pending-request table with worker-driven timeout expiry.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use h1session::TimestampNs;
use tracing::warn;

use crate::flow::FlowHash;
use crate::record::{Endpoint, RecordHeaders};

/// A request waiting for its response on the same flow.
#[derive(Debug)]
pub(crate) struct PendingTransaction {
    /// Cancellation token: the deadline scheduled for this entry carries the
    /// same sequence number, and a deadline whose sequence no longer matches
    /// the stored entry is ignored. Pairing or overwriting therefore cancels
    /// the old deadline deterministically.
    pub(crate) seq: u64,
    pub(crate) ts: TimestampNs,
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) src: Endpoint,
    pub(crate) dst: Endpoint,
    pub(crate) request_raw: Option<String>,
    pub(crate) request_headers: Option<RecordHeaders>,
    pub(crate) real_ip: Option<String>,
}

/// One pending transaction per flow, keyed by the direction-independent
/// flow hash, expired by a delay queue the owning worker drives.
#[derive(Debug)]
pub(crate) struct TransactionTable {
    pending:    HashMap<FlowHash, PendingTransaction>,
    deadlines:  BinaryHeap<Reverse<(u64, u64, FlowHash)>>,
    timeout_ns: u64,
    next_seq:   u64,
}

impl TransactionTable {
    pub(crate) fn new(timeout_ns: u64) -> Self {
        Self {
            pending: HashMap::new(),
            deadlines: BinaryHeap::new(),
            timeout_ns,
            next_seq: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, hash: &FlowHash) -> Option<&PendingTransaction> {
        self.pending.get(hash)
    }

    /// Store a freshly completed request. A flow can hold only one pending
    /// transaction; an unanswered predecessor is dropped.
    pub(crate) fn register_request(&mut self, hash: FlowHash, mut txn: PendingTransaction) {
        if self.pending.contains_key(&hash) {
            warn!("two requests without a response, dropping the old request");
        }
        txn.seq = self.next_seq;
        self.next_seq += 1;
        self.deadlines
            .push(Reverse((txn.ts.0 + self.timeout_ns, txn.seq, hash)));
        self.pending.insert(hash, txn);
    }

    /// Remove and return the pending transaction for `hash`, if any. Its
    /// scheduled deadline dies by sequence mismatch.
    pub(crate) fn take(&mut self, hash: &FlowHash) -> Option<PendingTransaction> {
        self.pending.remove(hash)
    }

    /// Process due deadlines: entries whose request is older than the
    /// timeout are dropped. Returns how many were expired.
    pub(crate) fn expire(&mut self, now: TimestampNs) -> usize {
        let mut expired = 0;
        while let Some(&Reverse((deadline, seq, hash))) = self.deadlines.peek() {
            if deadline > now.0 {
                break;
            }
            self.deadlines.pop();
            // A stale deadline — its entry was paired or overwritten since
            // it was scheduled — finds a different sequence and is ignored.
            if self.pending.get(&hash).is_some_and(|t| t.seq == seq) {
                self.pending.remove(&hash);
                warn!("request timed out without a response, dropping");
                expired += 1;
            }
        }
        expired
    }
}
