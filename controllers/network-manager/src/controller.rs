//! Main controller implementation.
//!
//! Builds the Kubernetes APIs, the snapshot store and the reconciler, then
//! runs the topology watcher and the periodic resync until shutdown.

use crds::{Cluster, ClusterNode, NodeConfig};
use kube::{Api, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::KubeClusterStore;
use crate::watcher::{resync_topology, watch_topology};

/// Timing settings of the network manager
#[derive(Debug, Clone, Copy)]
pub struct ManagerConfig {
    pub requeue: Duration,
    pub resync: Duration,
    pub debounce: Duration,
}

/// Main controller for the overlay topology.
pub struct Controller {
    topology_watcher: JoinHandle<Result<(), ControllerError>>,
    resync: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ManagerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Network Manager");

        let kube_client = Client::try_default().await?;

        // All three resources are cluster-scoped
        let cluster_api: Api<Cluster> = Api::all(kube_client.clone());
        let cluster_node_api: Api<ClusterNode> = Api::all(kube_client.clone());
        let node_config_api: Api<NodeConfig> = Api::all(kube_client);

        let store = KubeClusterStore::new(cluster_api.clone(), cluster_node_api.clone(), node_config_api.clone());
        let reconciler = Arc::new(Reconciler::new(store, node_config_api, config.resync, config.requeue));

        let topology_watcher = tokio::spawn(watch_topology(
            cluster_api,
            cluster_node_api,
            reconciler.clone(),
            config.debounce,
        ));
        let resync = tokio::spawn(resync_topology(reconciler, config.resync));

        Ok(Self { topology_watcher, resync })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Network Manager running");

        tokio::select! {
            result = &mut self.topology_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Topology watcher panicked: {}", e)))??;
            }
            result = &mut self.resync => {
                result.map_err(|e| ControllerError::Watch(format!("Topology resync panicked: {}", e)))??;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
            }
        }

        Ok(())
    }
}
