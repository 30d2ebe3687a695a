//! Node convergence engine
//!
//! Holds the latest desired config and drives the host toward it through a
//! [`NetworkBackend`]. One pass runs at a time per manager: the watch handler
//! and the periodic checker serialize on the same lock, and a pass that has
//! started applying always runs to completion.

use crds::NodeConfigSpec;
use network_backend::{BackendError, NetworkBackend, ResourceKind};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::diff::{ConfigDiff, diff};
use crate::metrics::AgentMetrics;

/// Outcome of the most recent convergence pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    /// Holds the reason, one cause per failed item joined by `"; "`
    Exception(String),
}

impl SyncStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncStatus::Success)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Success => write!(f, "Success"),
            SyncStatus::Exception(reason) => write!(f, "Exception: {}", reason),
        }
    }
}

#[derive(Debug)]
struct SyncState {
    /// Latest desired config
    to_config: Option<NodeConfigSpec>,
    /// Host state as last loaded
    from_config: Option<NodeConfigSpec>,
    status: SyncStatus,
}

/// Converges one node's overlay networking
pub struct NetworkManager {
    backend: Arc<dyn NetworkBackend>,
    state: Mutex<SyncState>,
    metrics: Option<Arc<AgentMetrics>>,
}

impl NetworkManager {
    pub fn new(backend: Arc<dyn NetworkBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(SyncState {
                to_config: None,
                from_config: None,
                status: SyncStatus::Success,
            }),
            metrics: None,
        }
    }

    /// Records every pass outcome in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<AgentMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Accepts a new desired config from the NodeConfig watch.
    ///
    /// An unchanged config returns the current status without touching the host.
    pub async fn update_from_crd(&self, spec: NodeConfigSpec) -> SyncStatus {
        let mut state = self.state.lock().await;
        if let Some(current) = &state.to_config {
            if diff(current, &spec).is_equal() {
                debug!("Desired config unchanged, skipping sync");
                return state.status.clone();
            }
        }
        state.to_config = Some(spec);
        self.update_sync(&mut state).await
    }

    /// Re-converges against the current desired config, repairing drift.
    ///
    /// Returns `None` while no desired config has been received.
    pub async fn update_from_checker(&self) -> Option<SyncStatus> {
        let mut state = self.state.lock().await;
        if state.to_config.is_none() {
            debug!("No desired config yet, nothing to check");
            return None;
        }
        Some(self.update_sync(&mut state).await)
    }

    pub async fn status(&self) -> SyncStatus {
        self.state.lock().await.status.clone()
    }

    /// Runs one convergence pass; the caller holds the state lock
    async fn update_sync(&self, state: &mut SyncState) -> SyncStatus {
        let status = self.converge(state).await;
        match (&status, &state.from_config) {
            (SyncStatus::Success, Some(actual)) => debug!(
                "Node converged from {} devices, {} routes, {} iptables, {} fdbs, {} arps",
                actual.devices.len(),
                actual.routes.len(),
                actual.iptables.len(),
                actual.fdbs.len(),
                actual.arps.len()
            ),
            (SyncStatus::Success, None) => debug!("Node converged"),
            (SyncStatus::Exception(reason), _) => warn!("Node convergence failed: {}", reason),
        }
        if let Some(metrics) = &self.metrics {
            metrics.observe(&status);
        }
        state.status = status.clone();
        status
    }

    async fn converge(&self, state: &mut SyncState) -> SyncStatus {
        let desired = state.to_config.clone().unwrap_or_default();

        let actual = match self.backend.load_actual_state().await {
            Ok(actual) => actual,
            Err(e) => return SyncStatus::Exception(format!("failed to load host state: {}", e)),
        };
        let changes = diff(&actual, &desired);
        state.from_config = Some(actual);

        if changes.is_equal() {
            return SyncStatus::Success;
        }

        info!(
            "Applying changes: delete {} devices, {} routes, {} iptables, {} fdbs, {} arps; \
             create {} devices, {} routes, {} iptables, {} fdbs, {} arps",
            changes.delete.devices.len(),
            changes.delete.routes.len(),
            changes.delete.iptables.len(),
            changes.delete.fdbs.len(),
            changes.delete.arps.len(),
            changes.create.devices.len(),
            changes.create.routes.len(),
            changes.create.iptables.len(),
            changes.create.fdbs.len(),
            changes.create.arps.len(),
        );

        let errors = self.write_sys(&changes).await;
        if errors.is_empty() {
            SyncStatus::Success
        } else {
            SyncStatus::Exception(errors.join("; "))
        }
    }

    /// Applies a diff to the host and returns every failure.
    ///
    /// Deletes run dependents first (arp, fdb, iptables, route, device),
    /// creates run the device first (device, arp, fdb, iptables, route).
    /// Every class is attempted whatever failed before it.
    pub async fn write_sys(&self, changes: &ConfigDiff) -> Vec<String> {
        let backend = &self.backend;
        let delete = &changes.delete;
        let create = &changes.create;
        let mut errors = Vec::new();

        if !delete.arps.is_empty() {
            record(&mut errors, "delete", ResourceKind::Arp, backend.delete_arps(&delete.arps).await);
        }
        if !delete.fdbs.is_empty() {
            record(&mut errors, "delete", ResourceKind::Fdb, backend.delete_fdbs(&delete.fdbs).await);
        }
        if !delete.iptables.is_empty() {
            record(
                &mut errors,
                "delete",
                ResourceKind::Iptables,
                backend.delete_iptables(&delete.iptables).await,
            );
        }
        if !delete.routes.is_empty() {
            record(&mut errors, "delete", ResourceKind::Route, backend.delete_routes(&delete.routes).await);
        }
        if !delete.devices.is_empty() {
            record(
                &mut errors,
                "delete",
                ResourceKind::Device,
                backend.delete_devices(&delete.devices).await,
            );
        }

        if !create.devices.is_empty() {
            record(&mut errors, "add", ResourceKind::Device, backend.add_devices(&create.devices).await);
        }
        if !create.arps.is_empty() {
            record(&mut errors, "add", ResourceKind::Arp, backend.add_arps(&create.arps).await);
        }
        if !create.fdbs.is_empty() {
            record(&mut errors, "add", ResourceKind::Fdb, backend.add_fdbs(&create.fdbs).await);
        }
        if !create.iptables.is_empty() {
            record(
                &mut errors,
                "add",
                ResourceKind::Iptables,
                backend.add_iptables(&create.iptables).await,
            );
        }
        if !create.routes.is_empty() {
            record(&mut errors, "add", ResourceKind::Route, backend.add_routes(&create.routes).await);
        }

        errors
    }
}

fn record(errors: &mut Vec<String>, action: &str, kind: ResourceKind, result: Result<(), BackendError>) {
    if let Err(e) = result {
        warn!("Failed to {} {}: {}", action, kind, e);
        errors.push(format!("{} {}: {}", action, kind, e));
    }
}
