use ring_wire::Rpc;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::election::initiate_election;
use crate::error::{Result, RingError};
use crate::neighbour::{NodeId, Role};
use crate::rpc::RpcShim;
use crate::state::RingState;

/// The repair loop used by every forward operation (`list`, `election`,
/// `coordinator`). `failed` is the neighbour that just refused
/// the forward. Installs `next_next` as the new `next`, restores its
/// back-link with `set_prev(self)`, optionally kicks an election, and
/// returns the new `next` for the caller to retry against.
///
/// Loops internally when the newly-promoted `next_next` is itself
/// unreachable, so the caller only ever sees success or
/// `RingError::Collapse`.
#[instrument(skip(state, rpc))]
pub async fn fix_next(state: &RingState, rpc: &RpcShim, mut failed: NodeId, election_kick: bool) -> Result<NodeId> {
    loop {
        let next_next = state.neighbours.get(Role::NextNext).await;
        let candidate = match next_next {
            None => {
                error!("ring collapsed: no next_next known");
                return Err(RingError::Collapse);
            }
            Some(nn) if nn == failed => {
                error!(%nn, "ring collapsed: next_next equals the dead next");
                return Err(RingError::Collapse);
            }
            Some(nn) => nn,
        };

        state.neighbours.set(Role::Next, candidate.clone()).await;

        match rpc
            .send_one_way(&candidate, Rpc::SetPrev(state.self_id().to_string()))
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_unreachable() => {
                warn!(%candidate, error = %err, "promoted next_next also unreachable, repairing again");
                failed = candidate;
                continue;
            }
            Err(err) => return Err(err),
        }

        if election_kick {
            if let Err(err) = rpc
                .send_one_way(&candidate, Rpc::Election(vec![state.self_id().to_string()]))
                .await
            {
                if err.is_unreachable() {
                    warn!(%candidate, error = %err, "election kick failed, repairing again");
                    failed = candidate;
                    continue;
                }
                return Err(err);
            }
        }

        debug!(new_next = %candidate, "next repaired");
        return Ok(candidate);
    }
}

/// Forwards `make_rpc()` to `next`, repairing and retrying through
/// `fix_next` until it succeeds or the ring collapses.
pub async fn forward_with_repair(
    state: &RingState,
    rpc: &RpcShim,
    election_kick: bool,
    make_rpc: impl Fn() -> Rpc,
) -> Result<()> {
    loop {
        let next = state
            .neighbours
            .get(Role::Next)
            .await
            .unwrap_or_else(|| state.self_id());
        match rpc.send_one_way(&next, make_rpc()).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_unreachable() => {
                fix_next(state, rpc, next, election_kick).await?;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Receiver side of `list`: stamps the heartbeat, and either drops the
/// token (lap complete) or appends `self` and forwards it on.
#[instrument(skip(state, rpc))]
pub async fn handle_list(state: &RingState, rpc: &RpcShim, mut participants: Vec<String>) {
    state.touch_heartbeat();
    let self_id = state.self_id().to_string();
    if participants.iter().any(|p| p == &self_id) {
        debug!("list token completed its lap");
        return;
    }
    participants.push(self_id);
    if let Err(err) =
        forward_with_repair(state, rpc, true, || Rpc::List(participants.clone())).await
    {
        error!(error = %err, "failed to forward list token");
    }
}

/// The periodic heartbeat task: probes `next` with a `list([self])` token
/// unless the quiet interval has already tripped the election trigger.
pub async fn run_heartbeat_loop(state: std::sync::Arc<RingState>, rpc: RpcShim) {
    let mut ticker = time::interval(state.config.heartbeat_interval);
    loop {
        ticker.tick().await;
        if state.heartbeat_timed_out() {
            warn!("heartbeat timeout elapsed, initiating election");
            initiate_election(&state, &rpc).await;
            continue;
        }
        let self_id = state.self_id().to_string();
        if let Err(err) =
            forward_with_repair(&state, &rpc, true, || Rpc::List(vec![self_id.clone()])).await
        {
            error!(error = %err, "heartbeat probe failed permanently");
        }
    }
}
