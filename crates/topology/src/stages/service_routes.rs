use kube::ResourceExt;
use tracing::debug;

use super::{Context, Stage};
use crate::error::TopologyError;
use crate::routes::{advertised_cidrs, build_routes};

/// Routes toward each gateway's cluster service CIDRs
pub struct ServiceRoutes;

impl Stage for ServiceRoutes {
    fn name(&self) -> &'static str {
        "ServiceRoutes"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        let filter = ctx.filter;
        for gateway in filter.gateway_nodes() {
            let Some(cluster) = filter.cluster_of(gateway) else {
                continue;
            };
            let cidrs = advertised_cidrs(filter, gateway, cluster.service_cidrs());
            let routes = build_routes(filter, &ctx.results, gateway, &cidrs);
            debug!("{} service routes toward {}", routes.len(), gateway.name_any());
            ctx.push_routes(self.name(), routes)?;
        }
        Ok(())
    }
}
