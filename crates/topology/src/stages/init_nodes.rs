use kube::ResourceExt;
use tracing::debug;

use super::{Context, Stage};
use crate::error::TopologyError;

/// Creates an empty config for every ClusterNode
pub struct InitNodes;

impl Stage for InitNodes {
    fn name(&self) -> &'static str {
        "InitNodes"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        for node in ctx.filter.all_nodes() {
            ctx.results.entry(node.name_any()).or_default();
        }
        debug!("Initialised {} node configs", ctx.results.len());
        Ok(())
    }
}
