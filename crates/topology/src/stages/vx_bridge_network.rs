use crds::constants::DeviceKind;

use super::{Context, Stage};
use crate::error::TopologyError;

/// `vx-bridge(-6)` devices for every gateway and endpoint node
pub struct VxBridgeNetwork;

impl Stage for VxBridgeNetwork {
    fn name(&self) -> &'static str {
        "VxBridgeNetwork"
    }

    fn run(&self, ctx: &mut Context<'_>) -> Result<(), TopologyError> {
        let filter = ctx.filter;
        for node in filter.mesh_nodes() {
            ctx.assign_devices(self.name(), node, DeviceKind::Bridge)?;
        }
        Ok(())
    }
}
