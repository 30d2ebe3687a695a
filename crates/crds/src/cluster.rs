//! Cluster Custom Resource Definition
//!
//! Describes one member cluster of the overlay: how its nodes mesh, which
//! address families it carries and the CIDRs handed out to its VXLAN devices.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ClusterSpec defines the desired network layout of a member cluster
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "clusterlink.microscaler.io",
    version = "v1alpha1",
    kind = "Cluster",
    status = "ClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// How nodes of this cluster join the inter-cluster mesh
    #[serde(default)]
    pub network_type: NetworkType,

    /// Address families carried by the overlay for this cluster
    #[serde(default)]
    pub ip_family: IPFamilyType,

    /// CIDRs for the intra-cluster `vx-local` devices
    #[serde(default, rename = "localCIDRs")]
    pub local_cidrs: VxlanCIDRs,

    /// CIDRs for the inter-cluster `vx-bridge` devices
    #[serde(default, rename = "bridgeCIDRs")]
    pub bridge_cidrs: VxlanCIDRs,

    /// Private CIDR -> public CIDR remap used for NAT peering
    #[serde(default, rename = "globalCIDRsMap", skip_serializing_if = "BTreeMap::is_empty")]
    pub global_cidrs_map: BTreeMap<String, String>,

    /// Allocate device addresses from a pool instead of deriving them from node IPs
    #[serde(default, rename = "useIPPool")]
    pub use_ip_pool: bool,
}

/// Mesh mode of a cluster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// One gateway node terminates the mesh; other nodes reach it over `vx-local`
    Gateway,
    /// Every node meshes directly
    #[default]
    P2p,
}

/// IP families supported by a cluster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IPFamilyType {
    Ipv4,
    Ipv6,
    #[default]
    #[serde(alias = "all")]
    Both,
}

/// A pair of IPv4/IPv6 CIDRs; either side may be empty
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VxlanCIDRs {
    #[serde(default)]
    pub ip: String,

    #[serde(default)]
    pub ip6: String,
}

impl VxlanCIDRs {
    pub fn new(ip: impl Into<String>, ip6: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ip6: ip6.into(),
        }
    }

    /// CIDR for the requested family, `None` when unset
    pub fn for_family(&self, ipv6: bool) -> Option<&str> {
        let cidr = if ipv6 { &self.ip6 } else { &self.ip };
        if cidr.is_empty() { None } else { Some(cidr.as_str()) }
    }
}

/// ClusterStatus carries the CIDRs discovered inside the cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Pod CIDRs advertised by the cluster
    #[serde(default, rename = "podCIDRs")]
    pub pod_cidrs: Vec<String>,

    /// Service CIDRs advertised by the cluster
    #[serde(default, rename = "serviceCIDRs")]
    pub service_cidrs: Vec<String>,
}

impl Cluster {
    pub fn is_p2p(&self) -> bool {
        self.spec.network_type == NetworkType::P2p
    }

    pub fn supports_ipv4(&self) -> bool {
        matches!(self.spec.ip_family, IPFamilyType::Ipv4 | IPFamilyType::Both)
    }

    pub fn supports_ipv6(&self) -> bool {
        matches!(self.spec.ip_family, IPFamilyType::Ipv6 | IPFamilyType::Both)
    }

    pub fn pod_cidrs(&self) -> &[String] {
        self.status.as_ref().map(|s| s.pod_cidrs.as_slice()).unwrap_or_default()
    }

    pub fn service_cidrs(&self) -> &[String] {
        self.status.as_ref().map(|s| s.service_cidrs.as_slice()).unwrap_or_default()
    }
}
