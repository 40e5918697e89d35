//! Ring membership and failure-recovery core: the join protocol, the
//! heartbeat-driven failure detector, the Chang-Roberts election, and the
//! coordinator broadcast that republishes membership and two-hop neighbours.

pub mod coordinator;
pub mod election;
pub mod error;
pub mod heartbeat;
pub mod join;
pub mod membership;
pub mod neighbour;
pub mod rpc;
pub mod server;
pub mod state;

pub use error::{Result, RingError};
pub use neighbour::{NeighbourTable, NodeId, Role};
pub use membership::MembershipList;
pub use rpc::RpcShim;
pub use state::{RingConfig, RingState};
