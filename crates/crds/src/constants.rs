//! Fixed names and numbers shared by the network manager and the node agent

pub const VXLAN_BRIDGE_NAME: &str = "vx-bridge";
pub const VXLAN_BRIDGE_ID: u32 = 54;
pub const VXLAN_BRIDGE_PORT: u16 = 4876;

pub const VXLAN_LOCAL_NAME: &str = "vx-local";
pub const VXLAN_LOCAL_ID: u32 = 55;
pub const VXLAN_LOCAL_PORT: u16 = 4877;

pub const VXLAN_BRIDGE_NAME_6: &str = "vx-bridge-6";
pub const VXLAN_BRIDGE_ID_6: u32 = 64;
pub const VXLAN_BRIDGE_PORT_6: u16 = 4866;

pub const VXLAN_LOCAL_NAME_6: &str = "vx-local-6";
pub const VXLAN_LOCAL_ID_6: u32 = 65;
pub const VXLAN_LOCAL_PORT_6: u16 = 4867;

/// Every device name the overlay manages
pub const MANAGED_DEVICES: [&str; 4] = [
    VXLAN_BRIDGE_NAME,
    VXLAN_LOCAL_NAME,
    VXLAN_BRIDGE_NAME_6,
    VXLAN_LOCAL_NAME_6,
];

/// FDB wildcard: unknown destinations flood to the entry's underlay IP
pub const ZERO_MAC: &str = "00:00:00:00:00:00";

pub const BROADCAST_MAC: &str = "ff:ff:ff:ff:ff:ff";

pub const NAT_TABLE: &str = "nat";
pub const PREROUTING: &str = "PREROUTING";
pub const POSTROUTING: &str = "POSTROUTING";

/// Which of the two overlay devices a name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Bridge,
    Local,
}

/// Fixed (name, id, port) for a device kind and family
pub fn device_params(kind: DeviceKind, ipv6: bool) -> (&'static str, u32, u16) {
    match (kind, ipv6) {
        (DeviceKind::Bridge, false) => (VXLAN_BRIDGE_NAME, VXLAN_BRIDGE_ID, VXLAN_BRIDGE_PORT),
        (DeviceKind::Bridge, true) => (VXLAN_BRIDGE_NAME_6, VXLAN_BRIDGE_ID_6, VXLAN_BRIDGE_PORT_6),
        (DeviceKind::Local, false) => (VXLAN_LOCAL_NAME, VXLAN_LOCAL_ID, VXLAN_LOCAL_PORT),
        (DeviceKind::Local, true) => (VXLAN_LOCAL_NAME_6, VXLAN_LOCAL_ID_6, VXLAN_LOCAL_PORT_6),
    }
}

pub fn device_name(kind: DeviceKind, ipv6: bool) -> &'static str {
    device_params(kind, ipv6).0
}

/// True for the IPv6 variants of the managed devices
pub fn is_ipv6_device(name: &str) -> bool {
    name == VXLAN_BRIDGE_NAME_6 || name == VXLAN_LOCAL_NAME_6
}
