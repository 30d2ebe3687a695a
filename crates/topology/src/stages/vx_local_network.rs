use crds::constants::DeviceKind;

use super::{Context, Stage};
use crate::error::TopologyError;

/// `vx-local(-6)` devices for gateways and the internal nodes behind them
pub struct VxLocalNetwork;

impl Stage for VxLocalNetwork {
    fn name(&self) -> &'static str {
        "VxLocalNetwork"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        let filter = ctx.filter;
        let mut nodes = filter.gateway_nodes();
        nodes.extend(filter.internal_nodes());

        for node in nodes {
            ctx.assign_devices(self.name(), node, DeviceKind::Local)?;
        }
        Ok(())
    }
}
