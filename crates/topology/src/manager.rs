//! ConfigManager
//!
//! Runs the stage pipeline over one snapshot and keeps the sorted per-node
//! results for the reconciler to persist.

use crds::{NodeConfig, NodeConfigSpec};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::TopologyError;
use crate::filter::TopologyFilter;
use crate::mac::{MacGenerator, RandomMacGenerator};
use crate::sort::sort_node_config;
use crate::stages::{Context, PIPELINE};
use crate::store::{ClusterStore, Snapshot};

pub struct ConfigManager {
    mac_generator: Box<dyn MacGenerator>,
    configs: BTreeMap<String, NodeConfigSpec>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(Box::new(RandomMacGenerator))
    }
}

impl ConfigManager {
    pub fn new(mac_generator: Box<dyn MacGenerator>) -> Self {
        Self {
            mac_generator,
            configs: BTreeMap::new(),
        }
    }

    /// Recomputes every node's config from `snapshot`.
    ///
    /// On error the results of the previous run are kept.
    pub fn calculate(&mut self, snapshot: Snapshot) -> Result<(), TopologyError> {
        let filter = TopologyFilter::new(snapshot);
        let mut ctx = Context::new(&filter, self.mac_generator.as_ref());

        for stage in PIPELINE {
            stage.run(&mut ctx)?;
            debug!("Stage {} complete", stage.name());
        }

        let mut results = ctx.results;
        for spec in results.values_mut() {
            sort_node_config(spec)?;
        }

        info!("Computed network config for {} nodes", results.len());
        self.configs = results;
        Ok(())
    }

    /// Reads a fresh snapshot from `store` and recomputes
    pub async fn calculate_from_store(&mut self, store: &dyn ClusterStore) -> Result<(), TopologyError> {
        let snapshot = store.snapshot().await?;
        self.calculate(snapshot)
    }

    /// Results as NodeConfig resources named after their node
    pub fn configs(&self) -> Vec<NodeConfig> {
        self.configs
            .iter()
            .map(|(name, spec)| NodeConfig::new(name, spec.clone()))
            .collect()
    }

    pub fn configs_by_node_name(&self) -> &BTreeMap<String, NodeConfigSpec> {
        &self.configs
    }

    pub fn config_by_node_name(&self, node_name: &str) -> Option<&NodeConfigSpec> {
        self.configs.get(node_name)
    }

    /// All results as one JSON document keyed by node name
    pub fn configs_string(&self) -> Result<String, TopologyError> {
        Ok(serde_json::to_string_pretty(&self.configs)?)
    }
}
