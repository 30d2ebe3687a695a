//! Deterministic ordering of NodeConfig lists
//!
//! Each list is ordered by the JSON serialization of its elements,
//! descending, so the same content always serializes to the same bytes no
//! matter which stage appended what first.

use crds::NodeConfigSpec;
use serde::Serialize;

use crate::error::TopologyError;

pub fn sort_by_json_desc<T: Serialize>(items: &mut Vec<T>) -> Result<(), TopologyError> {
    let mut keyed = items
        .drain(..)
        .map(|item| serde_json::to_string(&item).map(|key| (key, item)))
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    items.extend(keyed.into_iter().map(|(_, item)| item));
    Ok(())
}

pub fn sort_node_config(spec: &mut NodeConfigSpec) -> Result<(), TopologyError> {
    sort_by_json_desc(&mut spec.devices)?;
    sort_by_json_desc(&mut spec.routes)?;
    sort_by_json_desc(&mut spec.iptables)?;
    sort_by_json_desc(&mut spec.fdbs)?;
    sort_by_json_desc(&mut spec.arps)?;
    Ok(())
}
