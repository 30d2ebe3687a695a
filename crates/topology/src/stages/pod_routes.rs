use kube::ResourceExt;
use tracing::debug;

use super::{Context, Stage};
use crate::error::TopologyError;
use crate::routes::{advertised_cidrs, build_routes};

/// Routes toward pod CIDRs of every mesh node.
///
/// P2P endpoints advertise their own pod CIDRs; a gateway advertises the
/// aggregate pod CIDRs of its cluster.
pub struct PodRoutes;

impl Stage for PodRoutes {
    fn name(&self) -> &'static str {
        "PodRoutes"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        let filter = ctx.filter;
        for node in filter.mesh_nodes() {
            let Some(cluster) = filter.cluster_of(node) else {
                continue;
            };
            let pod_cidrs = if cluster.is_p2p() {
                node.spec.pod_cidrs.as_slice()
            } else {
                cluster.pod_cidrs()
            };
            let cidrs = advertised_cidrs(filter, node, pod_cidrs);
            let routes = build_routes(filter, &ctx.results, node, &cidrs);
            debug!("{} pod routes toward {}", routes.len(), node.name_any());
            ctx.push_routes(self.name(), routes)?;
        }
        Ok(())
    }
}
