use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RingError>;

/// Transport/timeout failures the repair loop recovers from, decode failures
/// a handler logs and drops, and ring collapse, which is fatal to the local
/// node's forward progress until it is rejoined.
#[derive(Debug, Error)]
pub enum RingError {
    #[error("rpc to {peer} timed out")]
    Timeout { peer: String },

    #[error("rpc to {peer} failed: {source}")]
    Transport { peer: String, source: io::Error },

    #[error("malformed rpc payload from peer: {0}")]
    Protocol(#[from] ring_wire::WireError),

    #[error("ring collapsed: no further neighbour is reachable")]
    Collapse,

    #[error("join aborted: neither predecessor nor its predecessor is reachable")]
    JoinAborted,

    #[error("peer {peer} sent an rpc of the wrong kind in reply")]
    UnexpectedResponse { peer: String },
}

impl RingError {
    /// True for the two failure modes the repair loop treats identically:
    /// the peer could not be reached in time.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RingError::Timeout { .. } | RingError::Transport { .. })
    }
}
