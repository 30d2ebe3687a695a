//! Network Manager
//!
//! Control-plane controller for the multi-cluster VXLAN overlay:
//! - Cluster: network mode, address family and overlay CIDRs of a member cluster
//! - ClusterNode: underlay addressing and mesh role of one node
//! - NodeConfig: the computed devices, routes, NAT rules, FDB and ARP entries
//!   each node agent applies
//!
//! Any change to a Cluster or ClusterNode recomputes the whole topology.

mod controller;
mod error;
mod reconciler;
mod store;
mod watcher;

use crate::controller::{Controller, ManagerConfig};
use crate::error::ControllerError;
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_REQUEUE_SECONDS: u64 = 10;
const DEFAULT_RESYNC_SECONDS: u64 = 300;
const DEFAULT_DEBOUNCE_SECONDS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    // kube and rustls both link a provider; pick one explicitly
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting Network Manager");

    // Load configuration from environment variables
    let config = ManagerConfig {
        requeue: seconds_from_env("REQUEUE_SECONDS", DEFAULT_REQUEUE_SECONDS)?,
        resync: seconds_from_env("RESYNC_SECONDS", DEFAULT_RESYNC_SECONDS)?,
        debounce: seconds_from_env("DEBOUNCE_SECONDS", DEFAULT_DEBOUNCE_SECONDS)?,
    };

    info!("Configuration:");
    info!("  Requeue after error: {:?}", config.requeue);
    info!("  Resync interval: {:?}", config.resync);
    info!("  Debounce: {:?}", config.debounce);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}

fn seconds_from_env(key: &str, default: u64) -> Result<Duration, ControllerError> {
    parse_seconds(key, env::var(key).ok().as_deref(), default)
}

fn parse_seconds(key: &str, value: Option<&str>, default: u64) -> Result<Duration, ControllerError> {
    let secs = match value {
        None => default,
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ControllerError::InvalidConfig(format!("{} must be a number of seconds: {}", key, e)))?,
    };
    if secs == 0 {
        return Err(ControllerError::InvalidConfig(format!("{} must be greater than zero", key)));
    }
    Ok(Duration::from_secs(secs))
}
