use crds::constants::{DeviceKind, device_name};
use kube::ResourceExt;
use tracing::warn;

use super::{Context, Stage, mac_cache_entries};
use crate::error::TopologyError;

/// Static FDB/ARP entries on internal nodes pointing at their gateway's `vx-local`
pub struct VxLocalMacCache;

impl Stage for VxLocalMacCache {
    fn name(&self) -> &'static str {
        "VxLocalMacCache"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        let filter = ctx.filter;
        for node in filter.internal_nodes() {
            let node_name = node.name_any();
            let Some(gateway) = filter.gateway_node_by_cluster(&node.spec.cluster_name) else {
                warn!("Cluster {} has no gateway node, skipping {}", node.spec.cluster_name, node_name);
                continue;
            };
            let gateway_name = gateway.name_any();

            for ipv6 in [false, true] {
                if !filter.supports_family(node, ipv6) {
                    continue;
                }
                let dev = device_name(DeviceKind::Local, ipv6);
                if ctx.device_from_results(&node_name, dev).is_none() {
                    continue;
                }
                let (Some(gateway_device), Some(underlay)) = (
                    ctx.device_from_results(&gateway_name, dev),
                    gateway.underlay_ip(ipv6),
                ) else {
                    continue;
                };

                let (fdbs, arp) = mac_cache_entries(dev, underlay, gateway_device);
                let config = ctx.config_mut(self.name(), &node_name)?;
                config.fdbs.extend(fdbs);
                config.arps.push(arp);
            }
        }
        Ok(())
    }
}
