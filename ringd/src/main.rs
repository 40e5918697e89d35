mod settings;

use std::sync::Arc;

use anyhow::Context;
use ring_core::{heartbeat, join, server, RingConfig, RingState, RpcShim};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().map_err(|err| anyhow::anyhow!(err))?;

    let settings = settings::Settings::load().context("loading ringd configuration")?;

    let ring_config = RingConfig {
        heartbeat_timeout: settings.heartbeat_timeout(),
        heartbeat_interval: settings.heartbeat_interval(),
        rpc_timeout: settings.rpc_timeout(),
    };

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("binding ring listener on {}", settings.bind_addr))?;
    let bind_addr = listener
        .local_addr()
        .context("reading bound listener address")?
        .to_string();

    let state = Arc::new(RingState::solo(bind_addr.clone(), ring_config));
    let rpc = RpcShim::new(state.config);

    info!(bind = %bind_addr, "ring node listening");

    let server_state = state.clone();
    let server_handle = tokio::spawn(server::run(listener, server_state, rpc, async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    match &settings.join_addr {
        Some(bootstrap) => {
            join::initiate_join(&state, &rpc, bootstrap)
                .await
                .with_context(|| format!("joining bootstrap peer {}", bootstrap))?;
            info!(bootstrap = %bootstrap, "joined ring");
        }
        None => info!("starting a new ring of one"),
    }

    tokio::spawn(heartbeat::run_heartbeat_loop(state.clone(), rpc));

    server_handle.await.context("ring server task panicked")?;
    Ok(())
}
