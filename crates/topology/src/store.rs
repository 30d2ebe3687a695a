//! Snapshot input of one compiler run

use async_trait::async_trait;
use crds::{Cluster, ClusterNode, NodeConfig};

use crate::error::TopologyError;

/// Everything one compiler run reads. Treated as immutable for the whole run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub clusters: Vec<Cluster>,
    pub cluster_nodes: Vec<ClusterNode>,
    pub node_configs: Vec<NodeConfig>,
}

/// Source of topology snapshots
///
/// The network manager implements this over the Kubernetes API; tests use
/// [`Snapshot`] directly, which is itself a store.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<Cluster>, TopologyError>;
    async fn list_cluster_nodes(&self) -> Result<Vec<ClusterNode>, TopologyError>;
    async fn list_node_configs(&self) -> Result<Vec<NodeConfig>, TopologyError>;

    /// Reads all three lists; any failure aborts the snapshot
    async fn snapshot(&self) -> Result<Snapshot, TopologyError> {
        Ok(Snapshot {
            clusters: self.list_clusters().await?,
            cluster_nodes: self.list_cluster_nodes().await?,
            node_configs: self.list_node_configs().await?,
        })
    }
}

#[async_trait]
impl ClusterStore for Snapshot {
    async fn list_clusters(&self) -> Result<Vec<Cluster>, TopologyError> {
        Ok(self.clusters.clone())
    }

    async fn list_cluster_nodes(&self) -> Result<Vec<ClusterNode>, TopologyError> {
        Ok(self.cluster_nodes.clone())
    }

    async fn list_node_configs(&self) -> Result<Vec<NodeConfig>, TopologyError> {
        Ok(self.node_configs.clone())
    }
}
