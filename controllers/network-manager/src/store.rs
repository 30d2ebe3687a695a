//! ClusterStore over the Kubernetes API

use async_trait::async_trait;
use crds::{Cluster, ClusterNode, NodeConfig};
use kube::Api;
use kube::api::ListParams;
use topology::{ClusterStore, TopologyError};

/// Lists the three cluster-scoped resources the compiler reads
#[derive(Clone)]
pub struct KubeClusterStore {
    cluster_api: Api<Cluster>,
    cluster_node_api: Api<ClusterNode>,
    node_config_api: Api<NodeConfig>,
}

impl KubeClusterStore {
    pub fn new(
        cluster_api: Api<Cluster>,
        cluster_node_api: Api<ClusterNode>,
        node_config_api: Api<NodeConfig>,
    ) -> Self {
        Self {
            cluster_api,
            cluster_node_api,
            node_config_api,
        }
    }
}

fn snapshot_error(kind: &str, e: kube::Error) -> TopologyError {
    TopologyError::Snapshot(format!("failed to list {}: {}", kind, e))
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn list_clusters(&self) -> Result<Vec<Cluster>, TopologyError> {
        let list = self
            .cluster_api
            .list(&ListParams::default())
            .await
            .map_err(|e| snapshot_error("clusters", e))?;
        Ok(list.items)
    }

    async fn list_cluster_nodes(&self) -> Result<Vec<ClusterNode>, TopologyError> {
        let list = self
            .cluster_node_api
            .list(&ListParams::default())
            .await
            .map_err(|e| snapshot_error("cluster nodes", e))?;
        Ok(list.items)
    }

    async fn list_node_configs(&self) -> Result<Vec<NodeConfig>, TopologyError> {
        let list = self
            .node_config_api
            .list(&ListParams::default())
            .await
            .map_err(|e| snapshot_error("node configs", e))?;
        Ok(list.items)
    }
}
