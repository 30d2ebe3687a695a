//! Test utilities for the convergence engine
//!
//! Builders for realistic overlay configs of a gateway node.

#[cfg(test)]
use crds::constants::{BROADCAST_MAC, NAT_TABLE, POSTROUTING, ZERO_MAC};
#[cfg(test)]
use crds::{Arp, Device, DeviceType, Fdb, Iptables, NodeConfigSpec, Route};

/// Helper to create a VXLAN device bound to eth0
#[cfg(test)]
pub fn device(name: &str, addr: &str, mac: &str, id: u32, port: u16) -> Device {
    Device {
        device_type: DeviceType::Vxlan,
        name: name.to_string(),
        addr: addr.to_string(),
        mac: mac.to_string(),
        bind_dev: "eth0".to_string(),
        id,
        port,
    }
}

/// Helper to create a spec with 2 devices, 1 arp, 1 fdb, 1 iptables rule and 1 route
#[cfg(test)]
pub fn sample_spec() -> NodeConfigSpec {
    NodeConfigSpec {
        devices: vec![
            device("vx-bridge", "220.168.1.1/8", "02:11:22:33:44:01", 54, 4876),
            device("vx-local", "210.168.1.1/8", "02:11:22:33:44:02", 55, 4877),
        ],
        routes: vec![Route {
            cidr: "10.2.0.0/16".to_string(),
            gw: "220.168.2.1".to_string(),
            dev: "vx-bridge".to_string(),
        }],
        iptables: vec![Iptables {
            table: NAT_TABLE.to_string(),
            chain: POSTROUTING.to_string(),
            rule: "-s 210.0.0.0/8 -j MASQUERADE".to_string(),
        }],
        fdbs: vec![Fdb {
            ip: "192.168.2.1".to_string(),
            mac: ZERO_MAC.to_string(),
            dev: "vx-bridge".to_string(),
        }],
        arps: vec![Arp {
            ip: "220.168.2.1".to_string(),
            mac: "02:11:22:33:55:01".to_string(),
            dev: "vx-bridge".to_string(),
        }],
    }
}

/// Helper to create a spec holding only broadcast FDB and ARP entries
#[cfg(test)]
pub fn broadcast_spec() -> NodeConfigSpec {
    NodeConfigSpec {
        fdbs: vec![Fdb {
            ip: "192.168.9.9".to_string(),
            mac: BROADCAST_MAC.to_string(),
            dev: "vx-bridge".to_string(),
        }],
        arps: vec![Arp {
            ip: "220.168.9.9".to_string(),
            mac: BROADCAST_MAC.to_string(),
            dev: "vx-bridge".to_string(),
        }],
        ..Default::default()
    }
}
