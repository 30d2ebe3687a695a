//! NodeConfig Custom Resource Definition
//!
//! The desired network state of one node. The network manager writes the spec,
//! the node agent converges the host toward it. Lists are order-irrelevant on
//! the wire; the manager sorts them so unchanged content serializes identically.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// NodeConfigSpec lists every overlay resource a node should carry
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[kube(
    group = "clusterlink.microscaler.io",
    version = "v1alpha1",
    kind = "NodeConfig",
    status = "NodeConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigSpec {
    #[serde(default)]
    pub devices: Vec<Device>,

    #[serde(default)]
    pub routes: Vec<Route>,

    #[serde(default)]
    pub iptables: Vec<Iptables>,

    #[serde(default)]
    pub fdbs: Vec<Fdb>,

    #[serde(default)]
    pub arps: Vec<Arp>,
}

impl NodeConfigSpec {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
            && self.routes.is_empty()
            && self.iptables.is_empty()
            && self.fdbs.is_empty()
            && self.arps.is_empty()
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }
}

/// Kind of link a Device describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Vxlan,
}

/// A VXLAN link with its overlay address
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,

    /// One of the fixed device names (`vx-bridge`, `vx-local`, `vx-bridge-6`, `vx-local-6`)
    pub name: String,

    /// Address with prefix length, e.g. `220.10.10.1/8`
    pub addr: String,

    pub mac: String,

    /// Physical interface carrying the encapsulated traffic
    pub bind_dev: String,

    /// VXLAN network identifier
    pub id: u32,

    /// VXLAN UDP destination port
    pub port: u16,
}

impl Device {
    /// Overlay address without its prefix length
    pub fn ip(&self) -> &str {
        self.addr.split('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub cidr: String,
    pub gw: String,
    pub dev: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Iptables {
    pub table: String,
    pub chain: String,
    pub rule: String,
}

/// Forwarding entry on a VXLAN device: MAC -> underlay IP
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Fdb {
    pub ip: String,
    pub mac: String,
    pub dev: String,
}

/// Static neighbour entry: overlay IP -> MAC
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Arp {
    pub ip: String,
    pub mac: String,
    pub dev: String,
}

/// NodeConfigStatus is maintained by the controllers, never by the compiler
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigStatus {
    /// When the network manager last changed the spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_change_time: Option<chrono::DateTime<chrono::Utc>>,

    /// When the node agent last converged successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<chrono::DateTime<chrono::Utc>>,
}
