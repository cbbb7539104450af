//! Traits for the analyzer's external collaborators.
//!
//! The process table and the record sink live in the host binary; the
//! analyzer only sees these seams.

use crate::flow::FlowKey;
use crate::record::TransactionRecord;

/// Process names for the two ends of a flow, oriented like the flow key
/// (`src` is the originator end).
#[derive(Debug, Clone, Default)]
pub struct ProcessPair {
    pub src: String,
    pub dst: String,
}

/// Maps a flow's endpoints to the local process names bound to them.
/// Consulted once per request, at the moment the request completes.
pub trait ProcessTable {
    /// Look up both endpoints of `flow`. Unknown endpoints come back as
    /// empty strings.
    fn lookup(&self, flow: &FlowKey) -> ProcessPair;
}

/// A process table that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProcessTable;

impl ProcessTable for NoProcessTable {
    fn lookup(&self, _flow: &FlowKey) -> ProcessPair {
        ProcessPair::default()
    }
}

/// Downstream consumer of completed transaction records.
///
/// Deliveries must not block the capture worker; an implementation that
/// cannot keep up drops records.
pub trait TransactionSink {
    /// Hand off one completed transaction.
    fn deliver(&self, record: TransactionRecord);
}

impl TransactionSink for tokio::sync::mpsc::UnboundedSender<TransactionRecord> {
    fn deliver(&self, record: TransactionRecord) {
        // A closed receiver means nobody is listening; the record is
        // dropped, not an error.
        let _ = self.send(record);
    }
}
