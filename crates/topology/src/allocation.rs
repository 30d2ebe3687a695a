//! Pool-based device addressing for clusters with `useIPPool`
//!
//! The allocator is seeded with every device address found in the previous
//! NodeConfigs. A node gets its previous address back while it still falls
//! inside the device CIDR; otherwise it receives the first host address that
//! nobody holds.

use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::debug;

use crate::address::{parse_cidr, strip_prefix_len};
use crate::error::TopologyError;
use crds::NodeConfig;
use kube::ResourceExt;

#[derive(Debug, Default)]
pub struct IpPoolAllocator {
    /// address -> node currently holding it
    owners: HashMap<IpAddr, String>,
}

impl IpPoolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves every device address already recorded in `configs`
    pub fn seeded<'a>(configs: impl IntoIterator<Item = &'a NodeConfig>) -> Self {
        let mut pool = Self::new();
        for config in configs {
            let node_name = config.name_any();
            for device in &config.spec.devices {
                if let Ok(ip) = strip_prefix_len(&device.addr).parse::<IpAddr>() {
                    pool.owners.entry(ip).or_insert_with(|| node_name.clone());
                }
            }
        }
        pool
    }

    /// Returns an `addr/len` inside `cidr` for `node_name`
    pub fn allocate(
        &mut self,
        node_name: &str,
        prior_addr: Option<&str>,
        cidr: &str,
    ) -> Result<String, TopologyError> {
        let net = parse_cidr(cidr)?;

        if let Some(ip) = prior_addr.and_then(|a| strip_prefix_len(a).parse::<IpAddr>().ok()) {
            let held_by_other = self.owners.get(&ip).is_some_and(|owner| owner != node_name);
            if net.contains(&ip) && !held_by_other {
                self.owners.insert(ip, node_name.to_string());
                return Ok(format!("{}/{}", ip, net.prefix_len()));
            }
        }

        let ip = self
            .first_free(&net)
            .ok_or_else(|| TopologyError::PoolExhausted(cidr.to_string()))?;
        debug!("Allocated {} from {} for node {}", ip, cidr, node_name);
        self.owners.insert(ip, node_name.to_string());
        Ok(format!("{}/{}", ip, net.prefix_len()))
    }

    fn first_free(&self, net: &IpNet) -> Option<IpAddr> {
        net.hosts().find(|ip| !self.owners.contains_key(ip))
    }
}
