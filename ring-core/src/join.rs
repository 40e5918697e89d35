use tracing::{debug, instrument, warn};

use crate::election::initiate_election;
use crate::error::Result;
use crate::neighbour::{NodeId, Role};
use crate::rpc::RpcShim;
use crate::state::RingState;

/// Runs at the bootstrap peer `B` on receiving `join(C)`.
///
/// Splices `C` in between `B` and `B`'s current predecessor, repairing
/// through `prev_prev` if that predecessor is unreachable. Returns the
/// identity `C` should install as its own `prev` (whichever neighbour
/// actually accepted the `set_next`).
#[instrument(skip(state, rpc))]
pub async fn handle_join(state: &RingState, rpc: &RpcShim, joiner: NodeId) -> Result<NodeId> {
    let _guard = state.join_mutex.lock().await;

    let prev = state
        .neighbours
        .get(Role::Prev)
        .await
        .unwrap_or_else(|| state.self_id());

    let chosen = match rpc.send_one_way(&prev, ring_wire::Rpc::SetNext(joiner.to_string())).await {
        Ok(()) => prev,
        Err(err) if err.is_unreachable() => {
            warn!(peer = %prev, error = %err, "prev unreachable during join, falling back to prev_prev");
            let prev_prev = state
                .neighbours
                .get(Role::PrevPrev)
                .await
                .ok_or(crate::error::RingError::JoinAborted)?;
            rpc.send_one_way(&prev_prev, ring_wire::Rpc::SetNext(joiner.to_string()))
                .await
                .map_err(|_| crate::error::RingError::JoinAborted)?;
            prev_prev
        }
        Err(err) => return Err(err),
    };

    state.neighbours.set(Role::Prev, joiner.clone()).await;
    debug!(joiner = %joiner, chosen_prev = %chosen, "join spliced in");

    Ok(chosen)
}

/// Runs at any node on receiving `set_next(new_next)` (one-way). Installs
/// the new successor and kicks off an election so the ring's two-hop
/// pointers get republished with the new node in view.
#[instrument(skip(state, rpc))]
pub async fn handle_set_next(state: &RingState, rpc: &RpcShim, new_next: NodeId) {
    state.touch_heartbeat();
    state.neighbours.set(Role::Next, new_next).await;
    initiate_election(state, rpc).await;
}

/// Runs at any node on receiving `set_prev(new_prev)` (one-way).
#[instrument(skip(state))]
pub async fn handle_set_prev(state: &RingState, new_prev: NodeId) {
    state.touch_heartbeat();
    state.neighbours.set(Role::Prev, new_prev).await;
}

/// Client-side bootstrap: `C` calling `join` against an already-running
/// peer `B`. Installs the returned predecessor and `B` itself as `next`.
#[instrument(skip(state, rpc))]
pub async fn initiate_join(state: &RingState, rpc: &RpcShim, bootstrap: &str) -> Result<()> {
    let prev = rpc.call_join(bootstrap, &state.self_id()).await?;
    state.neighbours.set(Role::Prev, NodeId::from(prev.as_str())).await;
    state.neighbours.set(Role::Next, NodeId::from(bootstrap)).await;
    Ok(())
}
