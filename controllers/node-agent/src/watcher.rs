//! NodeConfig watcher.
//!
//! Watches the single NodeConfig named after this node and feeds its spec
//! to the convergence engine through the debouncer.

use chrono::Utc;
use crds::{NodeConfig, NodeConfigSpec};
use futures::StreamExt;
use kube::Api;
use kube::api::{Patch, PatchParams};
use kube_runtime::{WatchStreamExt, watcher};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::error::AgentError;
use crate::sync::NetworkManager;

/// Watches this node's NodeConfig.
pub struct Watcher {
    manager: Arc<NetworkManager>,
    api: Api<NodeConfig>,
    debouncer: Debouncer,
    node_name: String,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(manager: Arc<NetworkManager>, api: Api<NodeConfig>, debouncer: Debouncer, node_name: String) -> Self {
        Self {
            manager,
            api,
            debouncer,
            node_name,
        }
    }

    /// Starts watching the NodeConfig of this node.
    pub async fn watch_node_config(&self) -> Result<(), AgentError> {
        info!("Starting NodeConfig watcher for node {}", self.node_name);

        let config = watcher::Config::default().fields(&format!("metadata.name={}", self.node_name));
        let mut stream = Box::pin(watcher(self.api.clone(), config).default_backoff());

        while let Some(result) = stream.next().await {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("NodeConfig watch error: {}", e);
                    continue;
                }
            };
            match event {
                watcher::Event::Apply(node_config) => {
                    info!("NodeConfig applied: {}", self.node_name);
                    self.schedule(node_config.spec, true);
                }
                watcher::Event::InitApply(node_config) => {
                    debug!("NodeConfig init apply: {}", self.node_name);
                    self.schedule(node_config.spec, true);
                }
                watcher::Event::Delete(_) => {
                    info!("NodeConfig deleted: {}, tearing down overlay", self.node_name);
                    self.schedule(NodeConfigSpec::default(), false);
                }
                watcher::Event::Init => {
                    info!("NodeConfig watcher initialized");
                }
                watcher::Event::InitDone => {
                    info!("NodeConfig watcher initialization complete");
                }
            }
        }

        Err(AgentError::Watch("NodeConfig watch stream ended".to_string()))
    }

    fn schedule(&self, spec: NodeConfigSpec, record: bool) {
        let manager = self.manager.clone();
        let api = self.api.clone();
        let node_name = self.node_name.clone();

        self.debouncer.call(move || async move {
            let status = manager.update_from_crd(spec).await;
            if !status.is_success() || !record {
                return;
            }
            if let Err(e) = record_sync_time(&api, &node_name).await {
                warn!("Failed to update NodeConfig {} status: {}", node_name, e);
            }
        });
    }
}

/// Stamps `status.lastSyncTime` after a successful pass
async fn record_sync_time(api: &Api<NodeConfig>, name: &str) -> Result<(), AgentError> {
    let patch = json!({
        "status": {
            "lastSyncTime": Utc::now(),
        }
    });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}
