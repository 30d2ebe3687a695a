//! Read-only queries over one topology snapshot
//!
//! Built once per compiler run. Every method is a pure read; returned node
//! lists are freshly allocated so stages can combine them without touching
//! the filter's own storage.

use crds::{Cluster, ClusterNode, Device, NodeConfig};
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::store::Snapshot;

pub struct TopologyFilter {
    clusters: BTreeMap<String, Cluster>,
    nodes: Vec<ClusterNode>,
    prior_configs: BTreeMap<String, NodeConfig>,
}

impl TopologyFilter {
    pub fn new(snapshot: Snapshot) -> Self {
        let clusters = snapshot
            .clusters
            .into_iter()
            .map(|c| (c.name_any(), c))
            .collect();
        let prior_configs = snapshot
            .node_configs
            .into_iter()
            .map(|nc| (nc.name_any(), nc))
            .collect();
        let mut nodes = snapshot.cluster_nodes;
        nodes.sort_by_key(|n| n.name_any());

        Self {
            clusters,
            nodes,
            prior_configs,
        }
    }

    /// Every node, ordered by name
    pub fn all_nodes(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().collect()
    }

    pub fn gateway_nodes(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|n| n.is_gateway()).collect()
    }

    /// Non-gateway nodes of P2P clusters
    pub fn endpoint_nodes(&self) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|n| !n.is_gateway() && self.cluster_of(n).is_some_and(Cluster::is_p2p))
            .collect()
    }

    /// Non-gateway nodes of gateway-mode clusters
    pub fn internal_nodes(&self) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|n| !n.is_gateway() && self.cluster_of(n).is_some_and(|c| !c.is_p2p()))
            .collect()
    }

    /// Nodes taking part in the inter-cluster mesh: gateways followed by endpoints
    pub fn mesh_nodes(&self) -> Vec<&ClusterNode> {
        let mut nodes = self.gateway_nodes();
        nodes.extend(self.endpoint_nodes());
        nodes
    }

    pub fn gateway_node_by_cluster(&self, cluster_name: &str) -> Option<&ClusterNode> {
        self.nodes
            .iter()
            .find(|n| n.spec.cluster_name == cluster_name && n.is_gateway())
    }

    pub fn nodes_in_cluster(&self, cluster_name: &str) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|n| n.spec.cluster_name == cluster_name)
            .collect()
    }

    pub fn nodes_except_cluster(&self, cluster_name: &str) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|n| n.spec.cluster_name != cluster_name)
            .collect()
    }

    pub fn cluster_by_name(&self, cluster_name: &str) -> Option<&Cluster> {
        self.clusters.get(cluster_name)
    }

    pub fn cluster_of(&self, node: &ClusterNode) -> Option<&Cluster> {
        self.cluster_by_name(&node.spec.cluster_name)
    }

    pub fn supports_ipv4(&self, node: &ClusterNode) -> bool {
        self.cluster_of(node).is_some_and(Cluster::supports_ipv4)
    }

    pub fn supports_ipv6(&self, node: &ClusterNode) -> bool {
        self.cluster_of(node).is_some_and(Cluster::supports_ipv6)
    }

    pub fn supports_family(&self, node: &ClusterNode, ipv6: bool) -> bool {
        if ipv6 {
            self.supports_ipv6(node)
        } else {
            self.supports_ipv4(node)
        }
    }

    /// Device of the same name from the node's previous NodeConfig
    pub fn prior_device(&self, node_name: &str, device_name: &str) -> Option<&Device> {
        self.prior_configs
            .get(node_name)
            .and_then(|nc| nc.spec.device(device_name))
    }

    pub fn prior_configs(&self) -> impl Iterator<Item = &NodeConfig> {
        self.prior_configs.values()
    }
}
