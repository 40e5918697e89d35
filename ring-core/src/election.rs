use tracing::{debug, error, info, instrument};

use crate::coordinator::emit_coordinator;
use crate::heartbeat::forward_with_repair;
use crate::rpc::RpcShim;
use crate::state::RingState;
use ring_wire::Rpc;

/// Starts a Chang–Roberts election: forwards `election([self])` to `next`.
/// Used both by the heartbeat loop (on timeout) and by `handle_set_next`
/// after a join splices a new node in.
#[instrument(skip(state, rpc))]
pub async fn initiate_election(state: &RingState, rpc: &RpcShim) {
    state.touch_heartbeat();
    let self_id = state.self_id().to_string();
    debug!("initiating election");
    if let Err(err) =
        forward_with_repair(state, rpc, false, || Rpc::Election(vec![self_id.clone()])).await
    {
        error!(error = %err, "failed to initiate election");
    }
}

/// Receiver side of `election(L)` at node `X`.
///
/// If `X` has not yet seen itself in the list, it appends itself and
/// forwards on. If it has, the lap is complete and `X` is the elected
/// coordinator, who emits `coordinator(L, TTL = |L| - 1)`.
#[instrument(skip(state, rpc))]
pub async fn handle_election(state: &RingState, rpc: &RpcShim, mut participants: Vec<String>) {
    state.touch_heartbeat();
    let self_id = state.self_id().to_string();

    if participants.iter().any(|p| p == &self_id) {
        info!(n = participants.len(), "elected as coordinator");
        emit_coordinator(state, rpc, participants).await;
        return;
    }

    participants.push(self_id);
    if let Err(err) =
        forward_with_repair(state, rpc, false, || Rpc::Election(participants.clone())).await
    {
        error!(error = %err, "failed to forward election message");
    }
}
