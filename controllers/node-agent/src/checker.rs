//! Periodic drift check
//!
//! Re-runs convergence on a fixed interval so hand-made changes on the host
//! are repaired even when the NodeConfig never changes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::sync::{NetworkManager, SyncStatus};

/// Calls [`NetworkManager::update_from_checker`] every `period` until
/// `shutdown` flips to true. A pass already running is never interrupted.
pub async fn run_checker(manager: Arc<NetworkManager>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    info!("Starting drift checker every {:?}", period);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick fires immediately; the watch handles the initial sync
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                info!("Drift checker stopped");
                return;
            }
        }

        match manager.update_from_checker().await {
            None => debug!("Drift check skipped, no desired config yet"),
            Some(SyncStatus::Success) => debug!("Drift check passed"),
            Some(SyncStatus::Exception(reason)) => warn!("Drift check failed: {}", reason),
        }
    }
}
