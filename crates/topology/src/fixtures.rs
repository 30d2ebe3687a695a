//! Resource builders for compiler tests

#![allow(dead_code)]

use crds::{
    Cluster, ClusterNode, ClusterNodeSpec, ClusterSpec, ClusterStatus, Device, DeviceType,
    IPFamilyType, NetworkType, NodeConfig, NodeConfigSpec, Role, VxlanCIDRs,
};

pub const LOCAL_CIDR: &str = "210.0.0.0/8";
pub const LOCAL_CIDR_6: &str = "9470::/16";
pub const BRIDGE_CIDR: &str = "220.0.0.0/8";
pub const BRIDGE_CIDR_6: &str = "9480::/16";

fn cluster(name: &str, network_type: NetworkType) -> Cluster {
    Cluster::new(
        name,
        ClusterSpec {
            network_type,
            ip_family: IPFamilyType::Both,
            local_cidrs: VxlanCIDRs::new(LOCAL_CIDR, LOCAL_CIDR_6),
            bridge_cidrs: VxlanCIDRs::new(BRIDGE_CIDR, BRIDGE_CIDR_6),
            ..Default::default()
        },
    )
}

pub fn gateway_cluster(name: &str) -> Cluster {
    cluster(name, NetworkType::Gateway)
}

pub fn p2p_cluster(name: &str) -> Cluster {
    cluster(name, NetworkType::P2p)
}

pub fn ipv4_only(mut cluster: Cluster) -> Cluster {
    cluster.spec.ip_family = IPFamilyType::Ipv4;
    cluster
}

pub fn with_status(mut cluster: Cluster, pod_cidrs: &[&str], service_cidrs: &[&str]) -> Cluster {
    cluster.status = Some(ClusterStatus {
        pod_cidrs: pod_cidrs.iter().map(|c| c.to_string()).collect(),
        service_cidrs: service_cidrs.iter().map(|c| c.to_string()).collect(),
    });
    cluster
}

pub fn with_global_map(mut cluster: Cluster, private: &str, public: &str) -> Cluster {
    cluster
        .spec
        .global_cidrs_map
        .insert(private.to_string(), public.to_string());
    cluster
}

pub fn node(name: &str, cluster_name: &str, ip: &str, gateway: bool) -> ClusterNode {
    ClusterNode::new(
        name,
        ClusterNodeSpec {
            cluster_name: cluster_name.to_string(),
            node_name: name.to_string(),
            ip: ip.to_string(),
            ip6: String::new(),
            roles: if gateway { vec![Role::Gateway] } else { vec![] },
            interface_name: "eth0".to_string(),
            pod_cidrs: vec![],
        },
    )
}

pub fn with_ip6(mut node: ClusterNode, ip6: &str) -> ClusterNode {
    node.spec.ip6 = ip6.to_string();
    node
}

pub fn with_pod_cidrs(mut node: ClusterNode, pod_cidrs: &[&str]) -> ClusterNode {
    node.spec.pod_cidrs = pod_cidrs.iter().map(|c| c.to_string()).collect();
    node
}

pub fn prior_config(node_name: &str, device_name: &str, mac: &str) -> NodeConfig {
    NodeConfig::new(
        node_name,
        NodeConfigSpec {
            devices: vec![Device {
                device_type: DeviceType::Vxlan,
                name: device_name.to_string(),
                addr: String::new(),
                mac: mac.to_string(),
                bind_dev: "eth0".to_string(),
                id: 0,
                port: 0,
            }],
            ..Default::default()
        },
    )
}
