//! ClusterNode Custom Resource Definition
//!
//! One node of a member cluster, as seen by the overlay.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ClusterNodeSpec describes a node's underlay addressing and mesh role
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "clusterlink.microscaler.io",
    version = "v1alpha1",
    kind = "ClusterNode"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNodeSpec {
    /// Name of the owning Cluster
    pub cluster_name: String,

    /// Kubernetes node name inside the member cluster
    #[serde(default)]
    pub node_name: String,

    /// Underlay IPv4 address
    #[serde(default)]
    pub ip: String,

    /// Underlay IPv6 address
    #[serde(default)]
    pub ip6: String,

    #[serde(default)]
    pub roles: Vec<Role>,

    /// Physical interface the VXLAN devices bind to
    #[serde(default)]
    pub interface_name: String,

    /// Pod CIDRs advertised by this node (used by P2P clusters)
    #[serde(default, rename = "podCIDRs")]
    pub pod_cidrs: Vec<String>,
}

/// Mesh role of a node. Nodes without a role are internal nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Gateway,
    Endpoint,
}

impl ClusterNode {
    pub fn is_gateway(&self) -> bool {
        self.spec.roles.contains(&Role::Gateway)
    }

    /// Underlay address for the requested family, `None` when unset
    pub fn underlay_ip(&self, ipv6: bool) -> Option<&str> {
        let ip = if ipv6 { &self.spec.ip6 } else { &self.spec.ip };
        if ip.is_empty() { None } else { Some(ip.as_str()) }
    }
}
