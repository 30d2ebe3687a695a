use crds::Iptables;
use crds::constants::{NAT_TABLE, POSTROUTING};
use kube::ResourceExt;

use super::{Context, Stage};
use crate::error::TopologyError;

/// MASQUERADE for the overlay CIDRs on gateways of gateway-mode clusters
pub struct HostNetwork;

impl Stage for HostNetwork {
    fn name(&self) -> &'static str {
        "HostNetwork"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        let filter = ctx.filter;
        for gateway in filter.gateway_nodes() {
            let Some(cluster) = filter.cluster_of(gateway) else {
                continue;
            };
            if cluster.is_p2p() {
                continue;
            }

            let mut rules = Vec::new();
            for ipv6 in [false, true] {
                if !filter.supports_family(gateway, ipv6) {
                    continue;
                }
                let cidrs = [
                    cluster.spec.local_cidrs.for_family(ipv6),
                    cluster.spec.bridge_cidrs.for_family(ipv6),
                ];
                for cidr in cidrs.into_iter().flatten() {
                    rules.push(Iptables {
                        table: NAT_TABLE.to_string(),
                        chain: POSTROUTING.to_string(),
                        rule: format!("-s {} -j MASQUERADE", cidr),
                    });
                }
            }

            ctx.config_mut(self.name(), &gateway.name_any())?
                .iptables
                .extend(rules);
        }
        Ok(())
    }
}
