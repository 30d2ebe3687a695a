//! End-to-end tests of the topology compiler over small multi-cluster fleets

#[path = "../src/fixtures.rs"]
mod fixtures;

use async_trait::async_trait;
use crds::constants::{BROADCAST_MAC, ZERO_MAC};
use crds::{Arp, Cluster, ClusterNode, Fdb, IPFamilyType, Iptables, NodeConfig, NodeConfigSpec, Route};
use fixtures::*;
use topology::stages::{Context, PIPELINE, Stage, VxBridgeNetwork};
use topology::{
    ClusterStore, ConfigManager, RandomMacGenerator, SequentialMacGenerator, Snapshot, TopologyError,
    TopologyFilter,
};

/// Two gateway-mode clusters (a, b) and one P2P cluster (c), IPv4 only
fn fleet() -> Snapshot {
    Snapshot {
        clusters: vec![
            ipv4_only(with_status(gateway_cluster("gw-a"), &["10.1.0.0/16"], &["10.11.0.0/16"])),
            ipv4_only(with_status(gateway_cluster("gw-b"), &["10.2.0.0/16"], &["10.12.0.0/16"])),
            ipv4_only(with_status(p2p_cluster("p2p-c"), &["10.3.0.0/16"], &["10.13.0.0/16"])),
        ],
        cluster_nodes: fleet_nodes(),
        node_configs: vec![],
    }
}

fn fleet_nodes() -> Vec<ClusterNode> {
    vec![
        node("a-gw", "gw-a", "192.168.1.1", true),
        node("a-1", "gw-a", "192.168.1.2", false),
        node("b-gw", "gw-b", "192.168.2.1", true),
        node("b-1", "gw-b", "192.168.2.2", false),
        with_pod_cidrs(node("c-1", "p2p-c", "192.168.3.1", false), &["10.3.1.0/24"]),
        with_pod_cidrs(node("c-2", "p2p-c", "192.168.3.2", false), &["10.3.2.0/24"]),
    ]
}

fn compile(snapshot: Snapshot) -> ConfigManager {
    let mut manager = ConfigManager::new(Box::new(SequentialMacGenerator::new()));
    manager.calculate(snapshot).unwrap();
    manager
}

fn spec<'a>(manager: &'a ConfigManager, node: &str) -> &'a NodeConfigSpec {
    manager
        .config_by_node_name(node)
        .unwrap_or_else(|| panic!("no config for {}", node))
}

fn route(cidr: &str, gw: &str, dev: &str) -> Route {
    Route {
        cidr: cidr.to_string(),
        gw: gw.to_string(),
        dev: dev.to_string(),
    }
}

fn routes_for<'a>(spec: &'a NodeConfigSpec, cidr: &str) -> Vec<&'a Route> {
    spec.routes.iter().filter(|r| r.cidr == cidr).collect()
}

fn rule(chain: &str, rule: &str) -> Iptables {
    Iptables {
        table: "nat".to_string(),
        chain: chain.to_string(),
        rule: rule.to_string(),
    }
}

#[test]
fn test_pipeline_order() {
    let names: Vec<_> = PIPELINE.iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        vec![
            "InitNodes",
            "VxLocalNetwork",
            "VxBridgeNetwork",
            "ServiceRoutes",
            "PodRoutes",
            "VxLocalMacCache",
            "VxBridgeMacCache",
            "GlobalMap",
            "HostNetwork",
        ]
    );
}

#[test]
fn test_every_node_gets_a_config() {
    let mut snapshot = fleet();
    snapshot
        .cluster_nodes
        .push(node("orphan", "missing", "192.168.9.9", false));
    let manager = compile(snapshot);

    assert_eq!(manager.configs_by_node_name().len(), 7);
    assert!(spec(&manager, "orphan").is_empty());
}

#[test]
fn test_device_assignment_and_address_derivation() {
    let manager = compile(fleet());

    let a_gw = spec(&manager, "a-gw");
    let bridge = a_gw.device("vx-bridge").unwrap();
    assert_eq!(bridge.addr, "220.168.1.1/8");
    assert_eq!((bridge.id, bridge.port), (54, 4876));
    assert_eq!(bridge.bind_dev, "eth0");
    let local = a_gw.device("vx-local").unwrap();
    assert_eq!(local.addr, "210.168.1.1/8");
    assert_eq!((local.id, local.port), (55, 4877));
    assert_eq!(a_gw.devices.len(), 2);

    // internal nodes only carry the uplink to their gateway
    let a_1 = spec(&manager, "a-1");
    assert_eq!(a_1.devices.len(), 1);
    assert_eq!(a_1.device("vx-local").unwrap().addr, "210.168.1.2/8");

    // P2P endpoints only carry the mesh device
    let c_1 = spec(&manager, "c-1");
    assert_eq!(c_1.devices.len(), 1);
    assert_eq!(c_1.device("vx-bridge").unwrap().addr, "220.168.3.1/8");

    for config in manager.configs() {
        for device in &config.spec.devices {
            let b0 = u8::from_str_radix(&device.mac[..2], 16).unwrap();
            assert_eq!(b0 & 0x03, 0x02, "bad MAC {} on {}", device.mac, config.metadata.name.as_deref().unwrap_or_default());
        }
    }
}

#[test]
fn test_dual_stack_devices() {
    let snapshot = Snapshot {
        clusters: vec![gateway_cluster("gw-a")],
        cluster_nodes: vec![with_ip6(
            node("a-gw", "gw-a", "100.10.10.1", true),
            "2409:7c85:6200::a0e:1702",
        )],
        node_configs: vec![],
    };
    let manager = compile(snapshot);
    let a_gw = spec(&manager, "a-gw");

    assert_eq!(a_gw.devices.len(), 4);
    let bridge6 = a_gw.device("vx-bridge-6").unwrap();
    assert_eq!(bridge6.addr, "9480:7c85:6200::a0e:1702/16");
    assert_eq!((bridge6.id, bridge6.port), (64, 4866));
    let local6 = a_gw.device("vx-local-6").unwrap();
    assert_eq!(local6.addr, "9470:7c85:6200::a0e:1702/16");
    assert_eq!((local6.id, local6.port), (65, 4867));
    assert_eq!(a_gw.device("vx-bridge").unwrap().addr, "220.10.10.1/8");
}

#[test]
fn test_node_without_underlay_for_family_is_skipped() {
    // cluster supports both families but the node only has an IPv4 address
    let snapshot = Snapshot {
        clusters: vec![gateway_cluster("gw-a")],
        cluster_nodes: vec![node("a-gw", "gw-a", "100.10.10.1", true)],
        node_configs: vec![],
    };
    let manager = compile(snapshot);
    let a_gw = spec(&manager, "a-gw");
    assert!(a_gw.device("vx-bridge").is_some());
    assert!(a_gw.device("vx-bridge-6").is_none());
    assert!(a_gw.device("vx-local-6").is_none());
}

#[test]
fn test_route_classification() {
    let manager = compile(fleet());

    // a peer gateway reaches b's pods directly over the mesh
    assert_eq!(
        routes_for(spec(&manager, "a-gw"), "10.2.0.0/16"),
        vec![&route("10.2.0.0/16", "220.168.2.1", "vx-bridge")]
    );
    // an internal node goes through its own gateway's vx-local address
    assert_eq!(
        routes_for(spec(&manager, "a-1"), "10.2.0.0/16"),
        vec![&route("10.2.0.0/16", "210.168.1.1", "vx-local")]
    );
    // P2P endpoints route directly too
    assert_eq!(
        routes_for(spec(&manager, "c-1"), "10.2.0.0/16"),
        vec![&route("10.2.0.0/16", "220.168.2.1", "vx-bridge")]
    );
    // nobody routes toward its own cluster
    assert!(routes_for(spec(&manager, "b-1"), "10.2.0.0/16").is_empty());
    assert!(routes_for(spec(&manager, "b-gw"), "10.2.0.0/16").is_empty());
}

#[test]
fn test_service_routes_only_toward_gateways() {
    let manager = compile(fleet());

    assert_eq!(
        routes_for(spec(&manager, "b-1"), "10.11.0.0/16"),
        vec![&route("10.11.0.0/16", "210.168.2.1", "vx-local")]
    );
    // P2P clusters have no gateway, so their service CIDRs are not routed
    for node in ["a-gw", "a-1", "b-gw", "b-1"] {
        assert!(routes_for(spec(&manager, node), "10.13.0.0/16").is_empty());
    }
}

#[test]
fn test_p2p_pod_routes_use_node_cidrs() {
    let manager = compile(fleet());
    let b_gw = spec(&manager, "b-gw");

    assert_eq!(
        routes_for(b_gw, "10.3.1.0/24"),
        vec![&route("10.3.1.0/24", "220.168.3.1", "vx-bridge")]
    );
    assert_eq!(
        routes_for(b_gw, "10.3.2.0/24"),
        vec![&route("10.3.2.0/24", "220.168.3.2", "vx-bridge")]
    );
    assert!(routes_for(b_gw, "10.3.0.0/16").is_empty());
    // endpoints of the same P2P cluster do not route to each other
    assert!(routes_for(spec(&manager, "c-2"), "10.3.1.0/24").is_empty());
}

#[test]
fn test_conflicting_cidrs_suppress_routes() {
    let mut snapshot = fleet();
    // cluster b claims a pod range covering cluster a's
    snapshot.clusters[1] = ipv4_only(with_status(gateway_cluster("gw-b"), &["10.0.0.0/8"], &["10.12.0.0/16"]));
    let manager = compile(snapshot);

    assert!(routes_for(spec(&manager, "b-gw"), "10.1.0.0/16").is_empty());
    assert!(routes_for(spec(&manager, "b-1"), "10.1.0.0/16").is_empty());
    assert!(routes_for(spec(&manager, "a-gw"), "10.0.0.0/8").is_empty());
    // unrelated peers are unaffected
    assert_eq!(routes_for(spec(&manager, "c-1"), "10.1.0.0/16").len(), 1);
}

#[test]
fn test_peer_without_family_gets_no_route() {
    let mut snapshot = fleet();
    let mut v6 = with_status(p2p_cluster("p2p-d"), &["fd00:1::/64"], &[]);
    v6.spec.ip_family = IPFamilyType::Ipv6;
    snapshot.clusters.push(v6);
    snapshot.cluster_nodes.push(with_pod_cidrs(
        with_ip6(node("d-1", "p2p-d", "", false), "2409::1"),
        &["fd00:1::/64"],
    ));
    let manager = compile(snapshot);

    let d_1 = spec(&manager, "d-1");
    assert_eq!(d_1.device("vx-bridge-6").unwrap().addr, "9480::1/16");
    assert!(d_1.routes.is_empty());
    for node in ["a-gw", "a-1", "b-gw", "c-1"] {
        assert!(routes_for(spec(&manager, node), "fd00:1::/64").is_empty());
    }
}

/// A dual-stack gateway cluster (a) and a dual-stack P2P cluster (c)
fn dual_stack_fleet() -> Snapshot {
    Snapshot {
        clusters: vec![
            with_status(
                gateway_cluster("gw-a"),
                &["10.1.0.0/16", "fd00:1::/64"],
                &["10.11.0.0/16", "fd00:11::/108"],
            ),
            with_status(p2p_cluster("p2p-c"), &["10.3.0.0/16", "fd00:3::/48"], &[]),
        ],
        cluster_nodes: vec![
            with_ip6(node("a-gw", "gw-a", "192.168.1.1", true), "2001:db8:1::1"),
            with_ip6(node("a-1", "gw-a", "192.168.1.2", false), "2001:db8:1::2"),
            with_pod_cidrs(
                with_ip6(node("c-1", "p2p-c", "192.168.3.1", false), "2001:db8:3::1"),
                &["10.3.1.0/24", "fd00:3:1::/64"],
            ),
        ],
        node_configs: vec![],
    }
}

#[test]
fn test_ipv6_route_classification() {
    let manager = compile(dual_stack_fleet());

    assert_eq!(spec(&manager, "c-1").device("vx-bridge-6").unwrap().addr, "9480:db8:3::1/16");
    assert_eq!(
        routes_for(spec(&manager, "a-gw"), "fd00:3:1::/64"),
        vec![&route("fd00:3:1::/64", "9480:db8:3::1", "vx-bridge-6")]
    );
    assert_eq!(
        routes_for(spec(&manager, "a-1"), "fd00:3:1::/64"),
        vec![&route("fd00:3:1::/64", "9470:db8:1::1", "vx-local-6")]
    );
    assert_eq!(
        routes_for(spec(&manager, "c-1"), "fd00:1::/64"),
        vec![&route("fd00:1::/64", "9480:db8:1::1", "vx-bridge-6")]
    );
    assert_eq!(
        routes_for(spec(&manager, "c-1"), "fd00:11::/108"),
        vec![&route("fd00:11::/108", "9480:db8:1::1", "vx-bridge-6")]
    );
    // the IPv4 side is unaffected
    assert_eq!(
        routes_for(spec(&manager, "a-1"), "10.3.1.0/24"),
        vec![&route("10.3.1.0/24", "210.168.1.1", "vx-local")]
    );
}

#[test]
fn test_ipv6_mac_caches() {
    let manager = compile(dual_stack_fleet());

    let gateway_local = spec(&manager, "a-gw").device("vx-local-6").unwrap().clone();
    let a_1 = spec(&manager, "a-1");
    assert_eq!(a_1.fdbs.iter().filter(|f| f.dev == "vx-local-6").count(), 2);
    assert!(a_1.fdbs.contains(&Fdb {
        ip: "2001:db8:1::1".to_string(),
        mac: ZERO_MAC.to_string(),
        dev: "vx-local-6".to_string(),
    }));
    assert!(a_1.fdbs.contains(&Fdb {
        ip: "2001:db8:1::1".to_string(),
        mac: gateway_local.mac.clone(),
        dev: "vx-local-6".to_string(),
    }));
    assert!(a_1.arps.contains(&Arp {
        ip: "9470:db8:1::1".to_string(),
        mac: gateway_local.mac,
        dev: "vx-local-6".to_string(),
    }));

    let c_1_bridge = spec(&manager, "c-1").device("vx-bridge-6").unwrap().clone();
    let a_gw = spec(&manager, "a-gw");
    assert!(a_gw.fdbs.contains(&Fdb {
        ip: "2001:db8:3::1".to_string(),
        mac: ZERO_MAC.to_string(),
        dev: "vx-bridge-6".to_string(),
    }));
    assert!(a_gw.fdbs.contains(&Fdb {
        ip: "2001:db8:3::1".to_string(),
        mac: c_1_bridge.mac.clone(),
        dev: "vx-bridge-6".to_string(),
    }));
    assert_eq!(
        a_gw.arps.iter().filter(|a| a.dev == "vx-bridge-6").collect::<Vec<_>>(),
        vec![&Arp {
            ip: "9480:db8:3::1".to_string(),
            mac: c_1_bridge.mac,
            dev: "vx-bridge-6".to_string(),
        }]
    );

    // internal nodes stay out of the IPv6 mesh as well
    assert!(a_1.arps.iter().all(|a| a.dev.starts_with("vx-local")));
}

#[test]
fn test_peer_without_family_device_gets_no_route() {
    // gw-a supports both families but its nodes only have IPv4 underlays
    let mut snapshot = dual_stack_fleet();
    for node in snapshot.cluster_nodes.iter_mut().filter(|n| n.spec.cluster_name == "gw-a") {
        node.spec.ip6.clear();
    }
    snapshot.cluster_nodes[2].spec.pod_cidrs = vec!["10.3.1.0/24".to_string(), "fd00:2:1::/64".to_string()];
    let manager = compile(snapshot);

    let a_gw = spec(&manager, "a-gw");
    assert!(a_gw.device("vx-bridge-6").is_none());
    assert!(routes_for(a_gw, "fd00:2:1::/64").is_empty());
    assert!(routes_for(spec(&manager, "a-1"), "fd00:2:1::/64").is_empty());
    assert!(spec(&manager, "c-1").routes.iter().all(|r| !r.dev.ends_with("-6")));

    assert_eq!(routes_for(a_gw, "10.3.1.0/24").len(), 1);
    assert_eq!(routes_for(spec(&manager, "a-1"), "10.3.1.0/24").len(), 1);
}

#[test]
fn test_vx_local_mac_cache() {
    let manager = compile(fleet());
    let gateway_local = spec(&manager, "a-gw").device("vx-local").unwrap().clone();
    let a_1 = spec(&manager, "a-1");

    assert_eq!(a_1.fdbs.len(), 2);
    assert!(a_1.fdbs.contains(&Fdb {
        ip: "192.168.1.1".to_string(),
        mac: ZERO_MAC.to_string(),
        dev: "vx-local".to_string(),
    }));
    assert!(a_1.fdbs.contains(&Fdb {
        ip: "192.168.1.1".to_string(),
        mac: gateway_local.mac.clone(),
        dev: "vx-local".to_string(),
    }));
    assert_eq!(
        a_1.arps,
        vec![Arp {
            ip: "210.168.1.1".to_string(),
            mac: gateway_local.mac,
            dev: "vx-local".to_string(),
        }]
    );
}

#[test]
fn test_vx_bridge_mac_cache_is_full_mesh() {
    let manager = compile(fleet());
    let mesh = ["a-gw", "b-gw", "c-1", "c-2"];

    for node in mesh {
        let config = spec(&manager, node);
        let bridge_arps: Vec<_> = config.arps.iter().filter(|a| a.dev == "vx-bridge").collect();
        let bridge_fdbs: Vec<_> = config.fdbs.iter().filter(|f| f.dev == "vx-bridge").collect();
        assert_eq!(bridge_arps.len(), mesh.len() - 1, "arps on {}", node);
        assert_eq!(bridge_fdbs.len(), 2 * (mesh.len() - 1), "fdbs on {}", node);
        assert!(bridge_fdbs.iter().all(|f| f.mac != BROADCAST_MAC));
    }

    let c_2_bridge = spec(&manager, "c-2").device("vx-bridge").unwrap().clone();
    assert!(spec(&manager, "a-gw").arps.contains(&Arp {
        ip: "220.168.3.2".to_string(),
        mac: c_2_bridge.mac,
        dev: "vx-bridge".to_string(),
    }));

    // internal nodes stay out of the mesh
    assert!(spec(&manager, "a-1").arps.iter().all(|a| a.dev == "vx-local"));
}

#[test]
fn test_global_map_rules_and_routes() {
    let mut snapshot = fleet();
    snapshot.clusters[0] = with_global_map(snapshot.clusters[0].clone(), "10.1.0.0/16", "172.16.0.0/16");
    let manager = compile(snapshot);

    let a_gw = spec(&manager, "a-gw");
    assert!(a_gw.iptables.contains(&rule(
        "PREROUTING",
        "-d 172.16.0.0/16 -i vx-bridge -j NETMAP --to 10.1.0.0/16"
    )));
    assert!(a_gw.iptables.contains(&rule(
        "POSTROUTING",
        "-s 10.1.0.0/16 -o vx-bridge -j NETMAP --to 172.16.0.0/16"
    )));
    // internal nodes carry no vx-bridge, so no NETMAP
    assert!(spec(&manager, "a-1").iptables.is_empty());

    // peers reach cluster a through its public range
    assert_eq!(
        routes_for(spec(&manager, "b-gw"), "172.16.0.0/16"),
        vec![&route("172.16.0.0/16", "220.168.1.1", "vx-bridge")]
    );
    assert!(routes_for(spec(&manager, "b-gw"), "10.1.0.0/16").is_empty());
}

#[test]
fn test_host_network_masquerade() {
    let manager = compile(fleet());

    assert_eq!(
        spec(&manager, "a-gw").iptables,
        vec![
            rule("POSTROUTING", "-s 220.0.0.0/8 -j MASQUERADE"),
            rule("POSTROUTING", "-s 210.0.0.0/8 -j MASQUERADE"),
        ]
    );
    assert!(spec(&manager, "c-1").iptables.is_empty());
    assert!(spec(&manager, "b-1").iptables.is_empty());
}

#[test]
fn test_mac_stability_across_runs() {
    let mut first = ConfigManager::new(Box::new(RandomMacGenerator));
    first.calculate(fleet()).unwrap();

    let mut snapshot = fleet();
    snapshot.node_configs = first.configs();
    let mut second = ConfigManager::new(Box::new(RandomMacGenerator));
    second.calculate(snapshot).unwrap();

    for (node, spec) in first.configs_by_node_name() {
        let again = second.config_by_node_name(node).unwrap();
        for device in &spec.devices {
            assert_eq!(
                again.device(&device.name).map(|d| d.mac.as_str()),
                Some(device.mac.as_str()),
                "{} on {}",
                device.name,
                node
            );
        }
    }
    assert_eq!(first.configs_string().unwrap(), second.configs_string().unwrap());
}

#[test]
fn test_output_independent_of_input_order() {
    let first = compile(fleet());

    // reuse the first run's MACs, then shuffle every input list
    let mut shuffled = fleet();
    shuffled.node_configs = first.configs();
    shuffled.node_configs.reverse();
    shuffled.clusters.reverse();
    shuffled.cluster_nodes.reverse();
    let second = compile(shuffled);

    assert_eq!(first.configs_string().unwrap(), second.configs_string().unwrap());
}

#[test]
fn test_lists_are_sorted_descending() {
    let manager = compile(fleet());
    for spec in manager.configs_by_node_name().values() {
        let keys: Vec<_> = spec.routes.iter().map(|r| serde_json::to_string(r).unwrap()).collect();
        let mut sorted = keys.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(keys, sorted);
    }
}

#[test]
fn test_ip_pool_addressing() {
    let mut snapshot = fleet();
    snapshot.clusters[2].spec.use_ip_pool = true;
    let first = compile(snapshot.clone());

    assert_eq!(spec(&first, "c-1").device("vx-bridge").unwrap().addr, "220.0.0.1/8");
    assert_eq!(spec(&first, "c-2").device("vx-bridge").unwrap().addr, "220.0.0.2/8");
    // derived clusters are unaffected
    assert_eq!(spec(&first, "a-gw").device("vx-bridge").unwrap().addr, "220.168.1.1/8");

    // a later run keeps the addresses even when node order changes
    snapshot.node_configs = first.configs();
    snapshot.cluster_nodes.retain(|n| n.spec.node_name != "c-1");
    snapshot
        .cluster_nodes
        .push(with_pod_cidrs(node("c-0", "p2p-c", "192.168.3.9", false), &["10.3.9.0/24"]));
    let second = compile(snapshot);
    assert_eq!(spec(&second, "c-2").device("vx-bridge").unwrap().addr, "220.0.0.2/8");
    assert_eq!(spec(&second, "c-0").device("vx-bridge").unwrap().addr, "220.0.0.3/8");
}

#[test]
fn test_stage_without_init_fails() {
    let filter = TopologyFilter::new(fleet());
    let generator = SequentialMacGenerator::new();
    let mut ctx = Context::new(&filter, &generator);

    let err = VxBridgeNetwork.run(&mut ctx).unwrap_err();
    assert!(matches!(err, TopologyError::Stage { stage: "VxBridgeNetwork", .. }));
}

struct FailingStore;

#[async_trait]
impl ClusterStore for FailingStore {
    async fn list_clusters(&self) -> Result<Vec<Cluster>, TopologyError> {
        Err(TopologyError::Snapshot("connection refused".to_string()))
    }

    async fn list_cluster_nodes(&self) -> Result<Vec<ClusterNode>, TopologyError> {
        Ok(vec![])
    }

    async fn list_node_configs(&self) -> Result<Vec<NodeConfig>, TopologyError> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_calculate_from_store() {
    let mut manager = ConfigManager::new(Box::new(SequentialMacGenerator::new()));
    manager.calculate_from_store(&fleet()).await.unwrap();
    assert_eq!(manager.configs().len(), 6);

    // a failed snapshot leaves the previous results in place
    let err = manager.calculate_from_store(&FailingStore).await.unwrap_err();
    assert!(matches!(err, TopologyError::Snapshot(_)));
    assert_eq!(manager.configs().len(), 6);
}
