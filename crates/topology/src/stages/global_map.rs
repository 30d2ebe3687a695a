use crds::Iptables;
use crds::constants::{DeviceKind, NAT_TABLE, POSTROUTING, PREROUTING, device_name};
use kube::ResourceExt;
use tracing::warn;

use super::{Context, Stage};
use crate::address::is_ipv6_cidr;
use crate::error::TopologyError;

/// NETMAP rules translating between private and public CIDRs on `vx-bridge`
pub struct GlobalMap;

impl Stage for GlobalMap {
    fn name(&self) -> &'static str {
        "GlobalMap"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        let filter = ctx.filter;
        for node in filter.mesh_nodes() {
            let Some(cluster) = filter.cluster_of(node) else {
                continue;
            };
            if cluster.spec.global_cidrs_map.is_empty() {
                continue;
            }
            let node_name = node.name_any();

            for (private, public) in &cluster.spec.global_cidrs_map {
                let ipv6 = match is_ipv6_cidr(private) {
                    Ok(ipv6) => ipv6,
                    Err(e) => {
                        warn!("Cluster {}: skipping global map entry: {}", cluster.name_any(), e);
                        continue;
                    }
                };
                if !filter.supports_family(node, ipv6) {
                    continue;
                }
                let dev = device_name(DeviceKind::Bridge, ipv6);
                if ctx.device_from_results(&node_name, dev).is_none() {
                    continue;
                }

                let config = ctx.config_mut(self.name(), &node_name)?;
                config.iptables.push(Iptables {
                    table: NAT_TABLE.to_string(),
                    chain: PREROUTING.to_string(),
                    rule: format!("-d {} -i {} -j NETMAP --to {}", public, dev, private),
                });
                config.iptables.push(Iptables {
                    table: NAT_TABLE.to_string(),
                    chain: POSTROUTING.to_string(),
                    rule: format!("-s {} -o {} -j NETMAP --to {}", private, dev, public),
                });
            }
        }
        Ok(())
    }
}
