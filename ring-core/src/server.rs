use std::future::Future;
use std::sync::Arc;

use bytes::BytesMut;
use ring_wire::Rpc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::coordinator::handle_coordinator;
use crate::election::handle_election;
use crate::heartbeat::handle_list;
use crate::join::{handle_join, handle_set_next, handle_set_prev};
use crate::neighbour::NodeId;
use crate::rpc::RpcShim;
use crate::state::RingState;

/// The RPC receiver: an accept loop that dispatches each accepted
/// connection onto its own task, one frame read and handled per
/// connection before it closes.
pub async fn run(listener: TcpListener, state: Arc<RingState>, rpc: RpcShim, shutdown: impl Future) {
    let (notify_shutdown, _) = broadcast::channel::<()>(1);
    let (complete_tx, mut complete_rx) = mpsc::unbounded_channel::<()>();

    let accept = accept_loop(listener, state, rpc, notify_shutdown.clone(), complete_tx.clone());

    tokio::pin!(shutdown);
    tokio::select! {
        _ = accept => {}
        _ = &mut shutdown => {
            info!("ring server shutting down");
        }
    }

    drop(notify_shutdown);
    drop(complete_tx);
    let _ = complete_rx.recv().await;
}

async fn accept_loop(
    mut listener: TcpListener,
    state: Arc<RingState>,
    rpc: RpcShim,
    notify_shutdown: broadcast::Sender<()>,
    complete_tx: mpsc::UnboundedSender<()>,
) {
    info!("accepting ring rpc connections");
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                error!(error = %err, "accept failed");
                continue;
            }
        };
        let state = state.clone();
        let rpc = rpc.clone();
        let mut shutdown_rx = notify_shutdown.subscribe();
        let complete = complete_tx.clone();
        tokio::spawn(async move {
            let _complete = complete;
            tokio::select! {
                () = handle_connection(socket, state, rpc) => {}
                _ = shutdown_rx.recv() => {
                    debug!(%addr, "dropping connection for shutdown");
                }
            }
        });
    }
}

/// A client dials, writes exactly one frame, and (for `join`) waits for one
/// response frame before closing — there is no persistent session, so each
/// accepted connection is handled start to finish by one task.
#[instrument(skip(socket, state, rpc))]
async fn handle_connection(mut socket: TcpStream, state: Arc<RingState>, rpc: RpcShim) {
    let mut buf = BytesMut::with_capacity(512);
    let decoded = loop {
        match Rpc::decode(&mut buf) {
            Ok(Some(rpc)) => break Some(rpc),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "dropping malformed rpc frame");
                return;
            }
        }
        match socket.read_buf(&mut buf).await {
            Ok(0) => break None,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "connection error while reading rpc frame");
                return;
            }
        }
    };

    let decoded = match decoded {
        Some(rpc) => rpc,
        None => return,
    };

    match decoded {
        Rpc::Join(id) => match handle_join(&state, &rpc, NodeId::from(id.as_str())).await {
            Ok(chosen) => {
                let mut out = BytesMut::new();
                Rpc::JoinResponse(chosen.to_string()).encode(&mut out);
                if let Err(err) = socket.write_all(&out).await {
                    warn!(error = %err, "failed to write join response");
                }
                let _ = socket.flush().await;
            }
            Err(err) => {
                error!(error = %err, "join failed, closing without a response");
            }
        },
        Rpc::SetNext(id) => handle_set_next(&state, &rpc, NodeId::from(id.as_str())).await,
        Rpc::SetPrev(id) => handle_set_prev(&state, NodeId::from(id.as_str())).await,
        Rpc::List(participants) => handle_list(&state, &rpc, participants).await,
        Rpc::Election(participants) => handle_election(&state, &rpc, participants).await,
        Rpc::Coordinator { ttl, participants } => {
            handle_coordinator(&state, &rpc, participants, ttl).await
        }
        Rpc::JoinResponse(_) => {
            warn!("unexpected join response received on the server side, dropping");
        }
    }
}
