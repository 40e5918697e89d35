use std::time::Duration;

use anyhow::{Context, Result};
use clap::{App, Arg};
use config::{Config, Environment};
use serde_derive::Deserialize;

const DEFAULT_BIND: &str = "127.0.0.1:4000";
const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 3;
const DEFAULT_RPC_TIMEOUT_MSEC: u64 = 3000;

/// Layered configuration: built-in defaults, overridden by `RING_*`
/// environment variables, overridden by CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    pub bind_addr: String,
    pub join_addr: Option<String>,
    pub heartbeat_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub rpc_timeout_msec: u64,
}

impl Settings {
    pub fn load() -> Result<Settings> {
        let matches = App::new("ringd")
            .about("Distributed file service ring-membership daemon")
            .arg(
                Arg::with_name("bind")
                    .long("bind")
                    .value_name("ADDR")
                    .help("address this node listens on and advertises as self"),
            )
            .arg(
                Arg::with_name("join")
                    .long("join")
                    .value_name("ADDR")
                    .help("bootstrap peer to join at startup; omit to start a new ring of one"),
            )
            .arg(
                Arg::with_name("heartbeat-timeout")
                    .long("heartbeat-timeout")
                    .value_name("SECS")
                    .help("seconds of quiet before an election is triggered"),
            )
            .arg(
                Arg::with_name("heartbeat-interval")
                    .long("heartbeat-interval")
                    .value_name("SECS")
                    .help("spacing between list probes to next"),
            )
            .arg(
                Arg::with_name("rpc-timeout-msec")
                    .long("rpc-timeout-msec")
                    .value_name("MSEC")
                    .help("per-RPC deadline in milliseconds"),
            )
            .get_matches();

        let mut builder = Config::new();
        builder.set_default("bind_addr", DEFAULT_BIND)?;
        builder.set_default("heartbeat_timeout_secs", DEFAULT_HEARTBEAT_TIMEOUT_SECS as i64)?;
        builder.set_default("heartbeat_interval_secs", DEFAULT_HEARTBEAT_INTERVAL_SECS as i64)?;
        builder.set_default("rpc_timeout_msec", DEFAULT_RPC_TIMEOUT_MSEC as i64)?;
        builder
            .merge(Environment::with_prefix("ring"))
            .context("loading RING_* environment overrides")?;

        if let Some(bind) = matches.value_of("bind") {
            builder.set("bind_addr", bind)?;
        }
        if let Some(join) = matches.value_of("join") {
            builder.set("join_addr", join)?;
        }
        if let Some(v) = matches.value_of("heartbeat-timeout") {
            builder.set("heartbeat_timeout_secs", v)?;
        }
        if let Some(v) = matches.value_of("heartbeat-interval") {
            builder.set("heartbeat_interval_secs", v)?;
        }
        if let Some(v) = matches.value_of("rpc-timeout-msec") {
            builder.set("rpc_timeout_msec", v)?;
        }

        builder
            .try_into()
            .context("assembling ringd settings from config layers")
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_msec)
    }
}
