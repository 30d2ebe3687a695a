use crds::constants::{DeviceKind, device_name};
use crds::{Arp, Fdb};
use kube::ResourceExt;

use super::{Context, Stage, mac_cache_entries};
use crate::error::TopologyError;

/// Full-mesh FDB/ARP entries between gateway and endpoint nodes on `vx-bridge`
pub struct VxBridgeMacCache;

impl Stage for VxBridgeMacCache {
    fn name(&self) -> &'static str {
        "VxBridgeMacCache"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        let filter = ctx.filter;
        let mesh = filter.mesh_nodes();
        let mut entries: Vec<(String, Vec<Fdb>, Arp)> = Vec::new();

        for node in &mesh {
            let node_name = node.name_any();
            for peer in &mesh {
                let peer_name = peer.name_any();
                if peer_name == node_name {
                    continue;
                }
                for ipv6 in [false, true] {
                    if !filter.supports_family(node, ipv6) || !filter.supports_family(peer, ipv6) {
                        continue;
                    }
                    let dev = device_name(DeviceKind::Bridge, ipv6);
                    if ctx.device_from_results(&node_name, dev).is_none() {
                        continue;
                    }
                    let (Some(peer_device), Some(underlay)) =
                        (ctx.device_from_results(&peer_name, dev), peer.underlay_ip(ipv6))
                    else {
                        continue;
                    };
                    let (fdbs, arp) = mac_cache_entries(dev, underlay, peer_device);
                    entries.push((node_name.clone(), fdbs, arp));
                }
            }
        }

        for (node_name, fdbs, arp) in entries {
            let config = ctx.config_mut(self.name(), &node_name)?;
            config.fdbs.extend(fdbs);
            config.arps.push(arp);
        }
        Ok(())
    }
}
