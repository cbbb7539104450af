//! Flow identity and the opaque per-flow parse state.

use std::net::IpAddr;

use h1session::Stream;

/// Which end of the connection sent the bytes, as labeled by the upstream
/// reassembler. Stable for the life of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The end that opened the connection (client side).
    Originator,
    /// The end that accepted it (server side).
    Responder,
}

impl Direction {
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Originator => 0,
            Self::Responder => 1,
        }
    }
}

/// The TCP four-tuple of a flow, oriented as the reassembler labeled it
/// (`src` is the originator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_ip:   IpAddr,
    pub src_port: u16,
    pub dst_ip:   IpAddr,
    pub dst_port: u16,
}

impl FlowKey {
    /// Build a key from the two endpoints as labeled by the reassembler.
    pub fn new(src_ip: IpAddr, src_port: u16, dst_ip: IpAddr, dst_port: u16) -> Self {
        Self {
            src_ip,
            src_port,
            dst_ip,
            dst_port,
        }
    }

    /// Direction-independent identity: both orientations of the four-tuple
    /// map to the same value, so a response looks up the transaction its
    /// request opened.
    pub fn symmetric_hash(&self) -> FlowHash {
        let a = (self.src_ip, self.src_port);
        let b = (self.dst_ip, self.dst_port);
        if a <= b {
            FlowHash { lo: a, hi: b }
        } else {
            FlowHash { lo: b, hi: a }
        }
    }
}

impl std::fmt::Display for FlowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port
        )
    }
}

/// Canonically ordered endpoint pair. See [`FlowKey::symmetric_hash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowHash {
    lo: (IpAddr, u16),
    hi: (IpAddr, u16),
}

/// Per-flow parse state: one [`Stream`] per direction.
///
/// This is the opaque private state of the reassembler interface — the
/// reassembler owns it and hands the core exclusive mutable access for the
/// duration of each entry point. A flow's state can be discarded once
/// [`is_idle`](Self::is_idle) reports true and no transaction is pending
/// for the flow.
#[derive(Debug, Default)]
pub struct FlowState {
    pub(crate) streams: [Option<Stream>; 2],
}

impl FlowState {
    /// Fresh state with no buffered bytes in either direction.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither direction holds buffered bytes or a message under
    /// construction.
    pub fn is_idle(&self) -> bool {
        self.streams.iter().all(|s| {
            s.as_ref()
                .is_none_or(|st| st.buffered() == 0 && st.message().is_none())
        })
    }
}
