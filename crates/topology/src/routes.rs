//! Route building with gateway indirection
//!
//! Gateways and P2P endpoints reach a target directly over `vx-bridge`.
//! Internal nodes of gateway-mode clusters send everything to their own
//! gateway over `vx-local`; the gateway already holds the direct route.

use crds::constants::{DeviceKind, device_name};
use crds::{ClusterNode, Device, NodeConfigSpec, Route};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::address::{cidrs_overlap, convert_to_global_cidrs, filter_by_family, parse_cidr};
use crate::filter::TopologyFilter;

/// CIDRs of `node` as peers should see them: remapped through the cluster's
/// global map and limited to the families the cluster supports
pub fn advertised_cidrs(filter: &TopologyFilter, node: &ClusterNode, cidrs: &[String]) -> Vec<String> {
    let Some(cluster) = filter.cluster_of(node) else {
        return Vec::new();
    };
    let global = convert_to_global_cidrs(cidrs, &cluster.spec.global_cidrs_map);
    let (kept, invalid) = filter_by_family(&global, cluster.supports_ipv4(), cluster.supports_ipv6());
    for cidr in invalid {
        warn!("Ignoring invalid CIDR {} advertised for node {}", cidr, node.name_any());
    }
    kept
}

/// True when any pod or service CIDR of `node`'s own cluster overlaps `cidr`
pub fn cidr_conflicts_with_self(filter: &TopologyFilter, node: &ClusterNode, cidr: &str) -> bool {
    let Ok(target) = parse_cidr(cidr) else {
        return false;
    };
    let Some(cluster) = filter.cluster_of(node) else {
        return false;
    };
    cluster
        .pod_cidrs()
        .iter()
        .chain(cluster.service_cidrs())
        .filter_map(|own| parse_cidr(own).ok())
        .any(|own| cidrs_overlap(&own, &target))
}

/// Routes every peer outside `target`'s cluster needs to reach `cidrs` on `target`.
///
/// Returns `(node name, route)` pairs; peers that cannot be served are
/// logged and skipped.
pub fn build_routes(
    filter: &TopologyFilter,
    results: &BTreeMap<String, NodeConfigSpec>,
    target: &ClusterNode,
    cidrs: &[String],
) -> Vec<(String, Route)> {
    let target_name = target.name_any();
    let mut routes = Vec::new();

    for cidr in cidrs {
        let ipv6 = match parse_cidr(cidr) {
            Ok(net) => matches!(net, ipnet::IpNet::V6(_)),
            Err(e) => {
                warn!("Skipping route for node {}: {}", target_name, e);
                continue;
            }
        };

        let bridge_name = device_name(DeviceKind::Bridge, ipv6);
        let Some(target_bridge) = device_of(results, &target_name, bridge_name) else {
            warn!(
                "Node {} has no {} device, no routes for {}",
                target_name, bridge_name, cidr
            );
            continue;
        };

        for peer in filter.nodes_except_cluster(&target.spec.cluster_name) {
            let peer_name = peer.name_any();
            let Some(peer_cluster) = filter.cluster_of(peer) else {
                continue;
            };
            if !filter.supports_family(peer, ipv6) {
                continue;
            }
            if cidr_conflicts_with_self(filter, peer, cidr) {
                debug!("Route {} conflicts with cluster of node {}, skipping", cidr, peer_name);
                continue;
            }

            if peer.is_gateway() || peer_cluster.is_p2p() {
                if device_of(results, &peer_name, bridge_name).is_none() {
                    debug!("Node {} has no {} device, no route for {}", peer_name, bridge_name, cidr);
                    continue;
                }
                routes.push((
                    peer_name,
                    Route {
                        cidr: cidr.clone(),
                        gw: target_bridge.ip().to_string(),
                        dev: bridge_name.to_string(),
                    },
                ));
                continue;
            }

            let local_name = device_name(DeviceKind::Local, ipv6);
            if device_of(results, &peer_name, local_name).is_none() {
                debug!("Node {} has no {} device, no route for {}", peer_name, local_name, cidr);
                continue;
            }
            let gateway_local = filter
                .gateway_node_by_cluster(&peer.spec.cluster_name)
                .and_then(|gw| device_of(results, &gw.name_any(), local_name));
            match gateway_local {
                Some(device) => routes.push((
                    peer_name,
                    Route {
                        cidr: cidr.clone(),
                        gw: device.ip().to_string(),
                        dev: local_name.to_string(),
                    },
                )),
                None => warn!(
                    "No gateway {} device in cluster {}, node {} gets no route for {}",
                    local_name, peer.spec.cluster_name, peer_name, cidr
                ),
            }
        }
    }

    routes
}

fn device_of<'a>(
    results: &'a BTreeMap<String, NodeConfigSpec>,
    node_name: &str,
    device_name: &str,
) -> Option<&'a Device> {
    results.get(node_name).and_then(|spec| spec.device(device_name))
}
