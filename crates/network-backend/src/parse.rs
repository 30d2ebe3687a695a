//! Parsers for `ip -j`, `bridge -j` and `iptables -S` output
//!
//! Only entries on the managed overlay devices are returned, so everything
//! else on the host is invisible to the diff.

use crds::constants::{MANAGED_DEVICES, is_ipv6_device};
use crds::{Arp, Device, DeviceType, Fdb, Iptables, Route};
use serde::Deserialize;

use crate::error::BackendError;

/// Comment attached to every iptables rule the agent installs
pub const RULE_COMMENT: &str = "clusterlink";

#[derive(Debug, Deserialize)]
struct IpLink {
    ifname: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    linkinfo: Option<LinkInfo>,
    #[serde(default)]
    addr_info: Vec<AddrInfo>,
}

#[derive(Debug, Deserialize)]
struct LinkInfo {
    info_kind: String,
    #[serde(default)]
    info_data: Option<VxlanInfo>,
}

#[derive(Debug, Deserialize)]
struct VxlanInfo {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    port: u16,
}

#[derive(Debug, Deserialize)]
struct AddrInfo {
    family: String,
    local: String,
    prefixlen: u8,
    #[serde(default)]
    scope: String,
}

#[derive(Debug, Deserialize)]
struct IpRoute {
    dst: String,
    #[serde(default)]
    gateway: Option<String>,
    #[serde(default)]
    dev: String,
}

#[derive(Debug, Deserialize)]
struct BridgeFdb {
    mac: String,
    #[serde(default)]
    ifname: String,
    #[serde(default)]
    dst: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpNeigh {
    dst: String,
    #[serde(default)]
    dev: String,
    #[serde(default)]
    lladdr: Option<String>,
    #[serde(default)]
    state: Vec<String>,
}

fn is_managed(dev: &str) -> bool {
    MANAGED_DEVICES.contains(&dev)
}

/// Parses the empty output some iproute2 versions print instead of `[]`
fn from_json<'a, T: Deserialize<'a>>(json: &'a str) -> Result<Vec<T>, BackendError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

/// Managed VXLAN devices from `ip -j -d addr show`
pub fn parse_devices(json: &str) -> Result<Vec<Device>, BackendError> {
    let links: Vec<IpLink> = from_json(json)?;
    let mut devices = Vec::new();

    for link in links.into_iter().filter(|l| is_managed(&l.ifname)) {
        let Some(info) = link.linkinfo.filter(|i| i.info_kind == "vxlan") else {
            continue;
        };
        let data = info.info_data.ok_or_else(|| {
            BackendError::Parse(format!("vxlan device {} has no info_data", link.ifname))
        })?;
        let family = if is_ipv6_device(&link.ifname) { "inet6" } else { "inet" };
        let addr = link
            .addr_info
            .iter()
            .find(|a| a.family == family && a.scope != "link")
            .map(|a| format!("{}/{}", a.local, a.prefixlen))
            .unwrap_or_default();

        devices.push(Device {
            device_type: DeviceType::Vxlan,
            name: link.ifname,
            addr,
            mac: link.address,
            bind_dev: data.link.unwrap_or_default(),
            id: data.id,
            port: data.port,
        });
    }
    Ok(devices)
}

/// Gateway routes over managed devices from `ip -j route show`
pub fn parse_routes(json: &str, ipv6: bool) -> Result<Vec<Route>, BackendError> {
    let routes: Vec<IpRoute> = from_json(json)?;
    Ok(routes
        .into_iter()
        .filter(|r| is_managed(&r.dev) && r.dst != "default")
        .filter_map(|r| {
            let gw = r.gateway?;
            let cidr = if r.dst.contains('/') {
                r.dst
            } else {
                format!("{}/{}", r.dst, if ipv6 { 128 } else { 32 })
            };
            Some(Route { cidr, gw, dev: r.dev })
        })
        .collect())
}

/// Static forwarding entries with a remote destination from `bridge -j fdb show`
pub fn parse_fdbs(json: &str) -> Result<Vec<Fdb>, BackendError> {
    let entries: Vec<BridgeFdb> = from_json(json)?;
    Ok(entries
        .into_iter()
        .filter(|e| is_managed(&e.ifname))
        .filter_map(|e| {
            Some(Fdb {
                ip: e.dst?,
                mac: e.mac,
                dev: e.ifname,
            })
        })
        .collect())
}

/// Permanent neighbours on managed devices from `ip -j neigh show`
pub fn parse_arps(json: &str) -> Result<Vec<Arp>, BackendError> {
    let entries: Vec<IpNeigh> = from_json(json)?;
    Ok(entries
        .into_iter()
        .filter(|n| is_managed(&n.dev) && n.state.iter().any(|s| s == "PERMANENT"))
        .filter_map(|n| {
            Some(Arp {
                ip: n.dst,
                mac: n.lladdr?,
                dev: n.dev,
            })
        })
        .collect())
}

/// Rules carrying [`RULE_COMMENT`] from `iptables -t <table> -S`
pub fn parse_iptables(output: &str, table: &str) -> Vec<Iptables> {
    let marker = format!(" -m comment --comment {}", RULE_COMMENT);
    output
        .lines()
        .filter_map(|line| line.strip_prefix("-A "))
        .filter(|line| line.contains(&marker))
        .filter_map(|line| {
            let line = line.replacen(&marker, "", 1);
            let (chain, rule) = line.split_once(' ')?;
            Some(Iptables {
                table: table.to_string(),
                chain: chain.to_string(),
                rule: rule.trim().to_string(),
            })
        })
        .collect()
}

/// Rule arguments with the ownership comment placed before the target
pub fn tagged_rule_args(rule: &str) -> Vec<String> {
    let mut args: Vec<String> = rule.split_whitespace().map(str::to_string).collect();
    let at = args.iter().position(|a| a == "-j").unwrap_or(args.len());
    let comment = ["-m", "comment", "--comment", RULE_COMMENT].map(str::to_string);
    args.splice(at..at, comment);
    args
}

/// True when a rule refers to an IPv6 CIDR or an IPv6 overlay device
pub fn is_ipv6_rule(rule: &str) -> bool {
    rule.split_whitespace().any(|token| {
        is_ipv6_device(token)
            || token.parse::<ipnet::Ipv6Net>().is_ok()
            || token.parse::<std::net::Ipv6Addr>().is_ok()
    })
}
