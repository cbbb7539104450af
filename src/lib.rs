// Passive HTTP/1.x sniffer core
// Reconstructs messages from captured TCP segments and correlates
// request/response transactions

// Re-export correlator types
pub use http_correlator::{
    Direction, Endpoint, FlowKey, FlowState, HeaderValue, HttpAnalyzer, HttpConfig, HttpDetail,
    Message, MessageKind, NoProcessTable, PasswordsConfig, ProcessPair, ProcessTable,
    RecordHeaders, TimestampNs, TransactionRecord, TransactionSink,
};

// Re-export the HTTP/1.x parsing crate
pub mod h1 {
    pub use h1session::*;
}
