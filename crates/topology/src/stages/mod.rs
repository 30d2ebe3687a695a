//! Compiler stages
//!
//! Nine stages run in the fixed order of [`PIPELINE`], each appending to the
//! shared per-node results. A stage never removes what an earlier stage
//! wrote.

mod global_map;
mod host_network;
mod init_nodes;
mod pod_routes;
mod service_routes;
mod vx_bridge_mac_cache;
mod vx_bridge_network;
mod vx_local_mac_cache;
mod vx_local_network;

pub use global_map::GlobalMap;
pub use host_network::HostNetwork;
pub use init_nodes::InitNodes;
pub use pod_routes::PodRoutes;
pub use service_routes::ServiceRoutes;
pub use vx_bridge_mac_cache::VxBridgeMacCache;
pub use vx_bridge_network::VxBridgeNetwork;
pub use vx_local_mac_cache::VxLocalMacCache;
pub use vx_local_network::VxLocalNetwork;

use crds::constants::{DeviceKind, ZERO_MAC, device_params};
use crds::{Arp, ClusterNode, Device, DeviceType, Fdb, NodeConfigSpec, Route};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::warn;

use crate::address::generate_vxlan_ip;
use crate::allocation::IpPoolAllocator;
use crate::error::TopologyError;
use crate::filter::TopologyFilter;
use crate::mac::MacGenerator;

/// One step of the compiler
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Appends this stage's contribution to `ctx.results`.
    ///
    /// Per-node problems are logged and skipped; an `Err` aborts the run.
    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError>;
}

pub static PIPELINE: &[&dyn Stage] = &[
    &InitNodes,
    &VxLocalNetwork,
    &VxBridgeNetwork,
    &ServiceRoutes,
    &PodRoutes,
    &VxLocalMacCache,
    &VxBridgeMacCache,
    &GlobalMap,
    &HostNetwork,
];

/// State shared by all stages of one run
pub struct Context<'a> {
    pub filter: &'a TopologyFilter,
    pub results: BTreeMap<String, NodeConfigSpec>,
    mac_generator: &'a dyn MacGenerator,
    pool: IpPoolAllocator,
}

impl<'a> Context<'a> {
    pub fn new(filter: &'a TopologyFilter, mac_generator: &'a dyn MacGenerator) -> Self {
        Self {
            filter,
            results: BTreeMap::new(),
            mac_generator,
            pool: IpPoolAllocator::seeded(filter.prior_configs()),
        }
    }

    /// Results entry of a node; a missing entry means InitNodes did not run
    pub fn config_mut(
        &mut self,
        stage: &'static str,
        node_name: &str,
    ) -> Result<&mut NodeConfigSpec, TopologyError> {
        self.results.get_mut(node_name).ok_or_else(|| TopologyError::Stage {
            stage,
            reason: format!("no config entry for node {}", node_name),
        })
    }

    pub fn device_from_results(&self, node_name: &str, device_name: &str) -> Option<&Device> {
        self.results.get(node_name).and_then(|spec| spec.device(device_name))
    }

    pub fn push_routes(
        &mut self,
        stage: &'static str,
        routes: Vec<(String, Route)>,
    ) -> Result<(), TopologyError> {
        for (node_name, route) in routes {
            self.config_mut(stage, &node_name)?.routes.push(route);
        }
        Ok(())
    }

    /// Builds the `kind` device of `node` for one family inside `cidr`.
    ///
    /// The address is derived from the underlay IP, or taken from the pool
    /// when the cluster uses one. The MAC is carried over from the node's
    /// previous device of the same name when there is one.
    fn build_device(
        &mut self,
        node: &ClusterNode,
        kind: DeviceKind,
        ipv6: bool,
        cidr: &str,
    ) -> Result<Device, TopologyError> {
        let filter = self.filter;
        let node_name = node.name_any();
        let (name, id, port) = device_params(kind, ipv6);
        let prior = filter.prior_device(&node_name, name);
        let use_pool = filter.cluster_of(node).is_some_and(|c| c.spec.use_ip_pool);

        let addr = if use_pool {
            self.pool
                .allocate(&node_name, prior.map(|d| d.addr.as_str()), cidr)?
        } else {
            let underlay = node.underlay_ip(ipv6).ok_or_else(|| {
                TopologyError::InvalidAddress(format!(
                    "node {} has no {} underlay address",
                    node_name,
                    if ipv6 { "IPv6" } else { "IPv4" }
                ))
            })?;
            generate_vxlan_ip(underlay, cidr)?
        };

        let mac = match prior {
            Some(device) if !device.mac.is_empty() => device.mac.clone(),
            _ => self.mac_generator.generate(),
        };

        Ok(Device {
            device_type: DeviceType::Vxlan,
            name: name.to_string(),
            addr,
            mac,
            bind_dev: node.spec.interface_name.clone(),
            id,
            port,
        })
    }

    /// Adds `kind` devices to `node` for every family its cluster supports
    /// and defines a CIDR for
    fn assign_devices(
        &mut self,
        stage: &'static str,
        node: &ClusterNode,
        kind: DeviceKind,
    ) -> Result<(), TopologyError> {
        let filter = self.filter;
        let node_name = node.name_any();
        let Some(cluster) = filter.cluster_of(node) else {
            warn!("Node {} references unknown cluster {}", node_name, node.spec.cluster_name);
            return Ok(());
        };
        let cidrs = match kind {
            DeviceKind::Bridge => &cluster.spec.bridge_cidrs,
            DeviceKind::Local => &cluster.spec.local_cidrs,
        };

        for ipv6 in [false, true] {
            if !filter.supports_family(node, ipv6) {
                continue;
            }
            let Some(cidr) = cidrs.for_family(ipv6) else {
                continue;
            };
            match self.build_device(node, kind, ipv6, cidr) {
                Ok(device) => self.config_mut(stage, &node_name)?.devices.push(device),
                Err(e) => warn!("{}: skipping device for node {}: {}", stage, node_name, e),
            }
        }
        Ok(())
    }
}

/// FDB/ARP entries that let `dev` reach `peer_device` through `peer_underlay`:
/// a zero-MAC flood entry, the peer's own MAC, and a static neighbour
fn mac_cache_entries(dev: &str, peer_underlay: &str, peer_device: &Device) -> (Vec<Fdb>, Arp) {
    let fdbs = vec![
        Fdb {
            ip: peer_underlay.to_string(),
            mac: ZERO_MAC.to_string(),
            dev: dev.to_string(),
        },
        Fdb {
            ip: peer_underlay.to_string(),
            mac: peer_device.mac.clone(),
            dev: dev.to_string(),
        },
    ];
    let arp = Arp {
        ip: peer_device.ip().to_string(),
        mac: peer_device.mac.clone(),
        dev: dev.to_string(),
    };
    (fdbs, arp)
}
