use ring_wire::Rpc;
use tracing::{debug, error, instrument, warn};

use crate::error::Result;
use crate::neighbour::{NodeId, Role};
use crate::rpc::RpcShim;
use crate::state::RingState;

/// Like `fix_next` but also prunes the unreachable `next` out of the
/// participant list before resuming forwarding, so downstream nodes only
/// ever see live peers. Each removal decrements `ttl` by one, mirroring
/// `remove_host`'s `--c->ttl` in the source.
async fn coord_fix(
    state: &RingState,
    rpc: &RpcShim,
    mut failed: NodeId,
    mut list: Vec<String>,
    mut ttl: i32,
) -> Result<(NodeId, Vec<String>, i32)> {
    loop {
        list.retain(|p| p.as_str() != &*failed);
        ttl -= 1;

        let next_next = state.neighbours.get(Role::NextNext).await;
        let candidate = match next_next {
            None => return Err(crate::error::RingError::Collapse),
            Some(nn) if nn == failed => return Err(crate::error::RingError::Collapse),
            Some(nn) => nn,
        };
        state.neighbours.set(Role::Next, candidate.clone()).await;

        match rpc
            .send_one_way(&candidate, Rpc::SetPrev(state.self_id().to_string()))
            .await
        {
            Ok(()) => return Ok((candidate, list, ttl)),
            Err(err) if err.is_unreachable() => {
                warn!(%candidate, error = %err, "coord_fix: promoted next_next also unreachable");
                failed = candidate;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Forwards `coordinator(list, ttl)` to `next`, pruning dead peers out of
/// `list` via `coord_fix` and retrying until it succeeds or the ring
/// collapses. Returns the (possibly pruned) list that was actually
/// delivered.
async fn forward_coordinator(
    state: &RingState,
    rpc: &RpcShim,
    mut ttl: i32,
    mut list: Vec<String>,
) -> Result<Vec<String>> {
    loop {
        let next = state
            .neighbours
            .get(Role::Next)
            .await
            .unwrap_or_else(|| state.self_id());
        let msg = Rpc::Coordinator {
            ttl,
            participants: list.clone(),
        };
        match rpc.send_one_way(&next, msg).await {
            Ok(()) => return Ok(list),
            Err(err) if err.is_unreachable() => {
                let (_, pruned, pruned_ttl) = coord_fix(state, rpc, next, list, ttl).await?;
                list = pruned;
                ttl = pruned_ttl;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Applies a (final, possibly pruned) participant list to the local
/// neighbour table and membership list. Runs at every node the message
/// reaches regardless of TTL.
async fn apply_locally(state: &RingState, list: &[String]) {
    let ids: Vec<NodeId> = list.iter().map(|s| NodeId::from(s.as_str())).collect();
    state.membership.update(ids).await;

    let self_id = state.self_id();
    let n = list.len();
    if n == 0 {
        state.mark_coordinator_seen();
        return;
    }
    if let Some(i) = list.iter().position(|p| p.as_str() == &*self_id) {
        let next_next = NodeId::from(list[(i + 2) % n].as_str());
        let prev_prev = NodeId::from(list[(i + n - 2) % n].as_str());
        state.neighbours.set(Role::NextNext, next_next).await;
        state.neighbours.set(Role::PrevPrev, prev_prev).await;
    }
    state.mark_coordinator_seen();
}

/// Called by the newly-elected coordinator: emits `coordinator(L, TTL = |L|
/// - 1)` to `next`, then applies the same list to itself exactly as any
/// other recipient would.
#[instrument(skip(state, rpc))]
pub async fn emit_coordinator(state: &RingState, rpc: &RpcShim, participants: Vec<String>) {
    let ttl = participants.len() as i32 - 1;
    let mut final_list = participants;

    if ttl > 0 {
        match forward_coordinator(state, rpc, ttl, final_list.clone()).await {
            Ok(pruned) => final_list = pruned,
            Err(err) => {
                error!(error = %err, "coordinator broadcast could not be emitted");
                return;
            }
        }
    }

    debug!(n = final_list.len(), "applying coordinator list locally (originator)");
    apply_locally(state, &final_list).await;
}

/// Receiver side of `coordinator(L, TTL)` at `X`.
#[instrument(skip(state, rpc))]
pub async fn handle_coordinator(state: &RingState, rpc: &RpcShim, participants: Vec<String>, ttl: i32) {
    state.touch_heartbeat();
    let mut final_list = participants;

    if ttl > 0 {
        match forward_coordinator(state, rpc, ttl - 1, final_list.clone()).await {
            Ok(pruned) => final_list = pruned,
            Err(err) => {
                error!(error = %err, "failed to forward coordinator message, not applying stale view");
                return;
            }
        }
    }

    apply_locally(state, &final_list).await;
}
