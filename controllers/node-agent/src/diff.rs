//! Desired vs. actual comparison
//!
//! Each resource class is compared independently by an all-pairs equality
//! scan. Entries carrying the broadcast MAC are never scheduled for deletion.

use crds::constants::BROADCAST_MAC;
use crds::NodeConfigSpec;

/// Returns `(is_equal, delete, create)`: `delete = old \ new`, `create = new \ old`
pub fn compare<T: Clone>(old: &[T], new: &[T], eq: impl Fn(&T, &T) -> bool) -> (bool, Vec<T>, Vec<T>) {
    let delete: Vec<T> = old
        .iter()
        .filter(|o| !new.iter().any(|n| eq(o, n)))
        .cloned()
        .collect();
    let create: Vec<T> = new
        .iter()
        .filter(|n| !old.iter().any(|o| eq(o, n)))
        .cloned()
        .collect();
    (delete.is_empty() && create.is_empty(), delete, create)
}

/// What has to be removed from and added to a host to reach the desired config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    pub delete: NodeConfigSpec,
    pub create: NodeConfigSpec,
}

impl ConfigDiff {
    pub fn is_equal(&self) -> bool {
        self.delete.is_empty() && self.create.is_empty()
    }
}

/// Diffs every resource class of `old` against `new`
pub fn diff(old: &NodeConfigSpec, new: &NodeConfigSpec) -> ConfigDiff {
    let (_, delete_devices, create_devices) = compare(&old.devices, &new.devices, |a, b| a == b);
    let (_, delete_routes, create_routes) = compare(&old.routes, &new.routes, |a, b| a == b);
    let (_, delete_iptables, create_iptables) = compare(&old.iptables, &new.iptables, |a, b| a == b);
    let (_, mut delete_fdbs, create_fdbs) = compare(&old.fdbs, &new.fdbs, |a, b| a == b);
    let (_, mut delete_arps, create_arps) = compare(&old.arps, &new.arps, |a, b| a == b);

    delete_fdbs.retain(|f| f.mac != BROADCAST_MAC);
    delete_arps.retain(|a| a.mac != BROADCAST_MAC);

    ConfigDiff {
        delete: NodeConfigSpec {
            devices: delete_devices,
            routes: delete_routes,
            iptables: delete_iptables,
            fdbs: delete_fdbs,
            arps: delete_arps,
        },
        create: NodeConfigSpec {
            devices: create_devices,
            routes: create_routes,
            iptables: create_iptables,
            fdbs: create_fdbs,
            arps: create_arps,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_spec;
    use crds::{Arp, Fdb, Route};

    #[test]
    fn test_compare_reflexive() {
        let spec = sample_spec();
        let (equal, delete, create) = compare(&spec.routes, &spec.routes, |a, b| a == b);
        assert!(equal);
        assert!(delete.is_empty() && create.is_empty());
        assert!(diff(&spec, &spec).is_equal());
    }

    #[test]
    fn test_compare_antisymmetric() {
        let a = vec![1, 2, 3];
        let b = vec![2, 3, 4, 5];
        let (equal_ab, delete_ab, create_ab) = compare(&a, &b, |x, y| x == y);
        let (equal_ba, delete_ba, create_ba) = compare(&b, &a, |x, y| x == y);
        assert!(!equal_ab && !equal_ba);
        assert_eq!(delete_ab, vec![1]);
        assert_eq!(create_ab, vec![4, 5]);
        assert_eq!(delete_ab, create_ba);
        assert_eq!(create_ab, delete_ba);

        let spec = sample_spec();
        let empty = NodeConfigSpec::default();
        let forward = diff(&empty, &spec);
        let backward = diff(&spec, &empty);
        assert_eq!(forward.create, backward.delete);
        assert_eq!(forward.delete, backward.create);
    }

    #[test]
    fn test_compare_ignores_order() {
        let route = |cidr: &str| Route {
            cidr: cidr.to_string(),
            gw: "220.0.0.1".to_string(),
            dev: "vx-bridge".to_string(),
        };
        let old = vec![route("10.1.0.0/16"), route("10.2.0.0/16")];
        let new = vec![route("10.2.0.0/16"), route("10.1.0.0/16")];
        assert!(compare(&old, &new, |a, b| a == b).0);
    }

    #[test]
    fn test_broadcast_entries_are_never_deleted() {
        let broadcast_fdb = Fdb {
            ip: "192.168.1.1".to_string(),
            mac: BROADCAST_MAC.to_string(),
            dev: "vx-bridge".to_string(),
        };
        let broadcast_arp = Arp {
            ip: "220.0.0.1".to_string(),
            mac: BROADCAST_MAC.to_string(),
            dev: "vx-bridge".to_string(),
        };
        let actual = NodeConfigSpec {
            fdbs: vec![broadcast_fdb.clone()],
            arps: vec![broadcast_arp.clone()],
            ..Default::default()
        };

        // present on the host, absent from the desired config: left alone
        assert!(diff(&actual, &NodeConfigSpec::default()).is_equal());

        // absent from the host, present in the desired config: created
        let created = diff(&NodeConfigSpec::default(), &actual);
        assert_eq!(created.create.fdbs, vec![broadcast_fdb]);
        assert_eq!(created.create.arps, vec![broadcast_arp]);
    }
}
