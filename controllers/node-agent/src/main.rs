//! Node Agent
//!
//! Runs on every node of a member cluster and converges the host's VXLAN
//! overlay (devices, routes, NAT rules, FDB and neighbour entries) toward the
//! `NodeConfig` computed for it by the network manager.

mod checker;
mod controller;
mod debounce;
mod diff;
mod error;
mod metrics;
mod sync;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::controller::{AgentConfig, Controller};
use crate::error::AgentError;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

const DEFAULT_DEBOUNCE_SECONDS: u64 = 5;
const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 30;
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

#[tokio::main]
async fn main() -> Result<(), AgentError> {
    tracing_subscriber::fmt::init();

    // kube and rustls both link a provider; pick one explicitly
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting Node Agent");

    // Load configuration from environment variables
    let node_name = env::var("NODE_NAME").map_err(|_| {
        AgentError::InvalidConfig("NODE_NAME environment variable is required".to_string())
    })?;
    let config = AgentConfig {
        node_name,
        debounce: seconds_from_env("DEBOUNCE_SECONDS", DEFAULT_DEBOUNCE_SECONDS)?,
        check_interval: seconds_from_env("CHECK_INTERVAL_SECONDS", DEFAULT_CHECK_INTERVAL_SECONDS)?,
        metrics_addr: parse_addr(env::var("METRICS_ADDR").ok().as_deref())?,
    };

    info!("Configuration:");
    info!("  Node: {}", config.node_name);
    info!("  Debounce: {:?}", config.debounce);
    info!("  Check interval: {:?}", config.check_interval);
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}

fn seconds_from_env(key: &str, default: u64) -> Result<Duration, AgentError> {
    parse_seconds(key, env::var(key).ok().as_deref(), default)
}

fn parse_seconds(key: &str, value: Option<&str>, default: u64) -> Result<Duration, AgentError> {
    let secs = match value {
        None => default,
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| AgentError::InvalidConfig(format!("{} must be a number of seconds: {}", key, e)))?,
    };
    if secs == 0 {
        return Err(AgentError::InvalidConfig(format!("{} must be greater than zero", key)));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_addr(value: Option<&str>) -> Result<SocketAddr, AgentError> {
    value
        .unwrap_or(DEFAULT_METRICS_ADDR)
        .parse()
        .map_err(|e| AgentError::InvalidConfig(format!("METRICS_ADDR is not a socket address: {}", e)))
}
