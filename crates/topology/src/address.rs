//! Address helpers
//!
//! Deterministic overlay address derivation and the small CIDR utilities the
//! stages share. Each node's overlay address is a pure function of its
//! underlay address and the device CIDR, so no central allocator is needed
//! in the default addressing mode.

use crate::error::TopologyError;
use ipnet::IpNet;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Derives an address inside `dest_cidr` that keeps the host bits of `underlay_ip`.
///
/// The network bits come from `dest_cidr`, the host bits from `underlay_ip`;
/// the result carries the prefix length of `dest_cidr`:
///
/// ```
/// # use topology::address::generate_vxlan_ip;
/// assert_eq!(generate_vxlan_ip("100.10.10.1", "210.0.0.0/8").unwrap(), "210.10.10.1/8");
/// ```
pub fn generate_vxlan_ip(underlay_ip: &str, dest_cidr: &str) -> Result<String, TopologyError> {
    let ip: IpAddr = underlay_ip
        .parse()
        .map_err(|_| TopologyError::InvalidAddress(underlay_ip.to_string()))?;
    let dest = parse_cidr(dest_cidr)?;

    let derived = match (ip, dest.addr(), dest.netmask()) {
        (IpAddr::V4(ip), IpAddr::V4(dest_addr), IpAddr::V4(mask)) => {
            let mask = u32::from(mask);
            let bits = (u32::from(dest_addr) & mask) | (u32::from(ip) & !mask);
            IpAddr::V4(Ipv4Addr::from(bits))
        }
        (IpAddr::V6(ip), IpAddr::V6(dest_addr), IpAddr::V6(mask)) => {
            let ip = ip.octets();
            let dest_addr = dest_addr.octets();
            let mask = mask.octets();
            let mut out = [0u8; 16];
            for (byte, ((d, m), i)) in out.iter_mut().zip(dest_addr.iter().zip(&mask).zip(&ip)) {
                *byte = (d & m) | (i & !m);
            }
            IpAddr::V6(Ipv6Addr::from(out))
        }
        _ => {
            return Err(TopologyError::FamilyMismatch(
                underlay_ip.to_string(),
                dest_cidr.to_string(),
            ));
        }
    };

    Ok(format!("{}/{}", derived, dest.prefix_len()))
}

pub fn parse_cidr(cidr: &str) -> Result<IpNet, TopologyError> {
    cidr.trim()
        .parse::<IpNet>()
        .map_err(|_| TopologyError::InvalidAddress(cidr.to_string()))
}

pub fn is_ipv6_cidr(cidr: &str) -> Result<bool, TopologyError> {
    Ok(matches!(parse_cidr(cidr)?, IpNet::V6(_)))
}

/// Two CIDRs overlap exactly when one contains the other
pub fn cidrs_overlap(a: &IpNet, b: &IpNet) -> bool {
    a.contains(b) || b.contains(a)
}

/// Address part of an `addr/len` string
pub fn strip_prefix_len(addr: &str) -> &str {
    addr.split('/').next().unwrap_or_default()
}

/// Replaces every CIDR that has an entry in `global_map` by its public counterpart
pub fn convert_to_global_cidrs(cidrs: &[String], global_map: &BTreeMap<String, String>) -> Vec<String> {
    cidrs
        .iter()
        .map(|cidr| global_map.get(cidr).cloned().unwrap_or_else(|| cidr.clone()))
        .collect()
}

/// Keeps the CIDRs whose family is enabled; unparsable entries are returned separately
pub fn filter_by_family(cidrs: &[String], ipv4: bool, ipv6: bool) -> (Vec<String>, Vec<String>) {
    let mut kept = Vec::new();
    let mut invalid = Vec::new();
    for cidr in cidrs {
        match is_ipv6_cidr(cidr) {
            Ok(true) if ipv6 => kept.push(cidr.clone()),
            Ok(false) if ipv4 => kept.push(cidr.clone()),
            Ok(_) => {}
            Err(_) => invalid.push(cidr.clone()),
        }
    }
    (kept, invalid)
}
