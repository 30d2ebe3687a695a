//! Topology reconciliation logic.
//!
//! Every reconcile reads a fresh snapshot, recomputes the whole topology and
//! persists the NodeConfigs that changed. Unchanged configs are not written,
//! so their `lastChangeTime` only moves when content does.

use chrono::Utc;
use crds::{NodeConfig, NodeConfigSpec};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use topology::{ClusterStore, ConfigManager};
use tracing::{Level, debug, enabled, info, warn};

use crate::error::ControllerError;

/// NodeConfig writes needed to bring the store in line with a computed topology
#[derive(Debug, Default, PartialEq)]
pub struct WritePlan {
    pub create: Vec<(String, NodeConfigSpec)>,
    pub update: Vec<(String, NodeConfigSpec)>,
    pub delete: Vec<String>,
}

impl WritePlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Compares stored NodeConfigs with the computed ones.
///
/// Stored configs whose node is no longer part of the topology are deleted.
pub fn plan_writes(existing: &[NodeConfig], computed: &BTreeMap<String, NodeConfigSpec>) -> WritePlan {
    let stored: BTreeMap<String, &NodeConfigSpec> = existing
        .iter()
        .map(|config| (config.name_any(), &config.spec))
        .collect();

    let mut plan = WritePlan::default();
    for (name, spec) in computed {
        match stored.get(name) {
            None => plan.create.push((name.clone(), spec.clone())),
            Some(current) if *current != spec => plan.update.push((name.clone(), spec.clone())),
            Some(_) => {}
        }
    }
    plan.delete = stored
        .keys()
        .filter(|name| !computed.contains_key(*name))
        .cloned()
        .collect();
    plan
}

/// Reconciler for the overlay topology.
pub struct Reconciler<S> {
    store: S,
    node_config_api: Api<NodeConfig>,
    manager: Mutex<ConfigManager>,
    resync: Duration,
    requeue: Duration,
}

impl<S: ClusterStore> Reconciler<S> {
    pub fn new(store: S, node_config_api: Api<NodeConfig>, resync: Duration, requeue: Duration) -> Self {
        Self {
            store,
            node_config_api,
            manager: Mutex::new(ConfigManager::default()),
            resync,
            requeue,
        }
    }

    /// Delay before retrying a failed reconcile
    pub fn requeue(&self) -> Duration {
        self.requeue
    }

    /// Recomputes the whole topology and persists what changed.
    ///
    /// The compiler lock is held until the writes finish so concurrent
    /// triggers never persist interleaved plans.
    pub async fn reconcile_topology(&self, trigger: &str) -> Result<Action, ControllerError> {
        info!("Reconciling topology (triggered by {})", trigger);

        let mut manager = self.manager.lock().await;
        let snapshot = self.store.snapshot().await?;
        let existing = snapshot.node_configs.clone();

        manager.calculate(snapshot)?;
        if enabled!(Level::DEBUG) {
            debug!("Computed node configs: {}", manager.configs_string()?);
        }
        let plan = plan_writes(&existing, manager.configs_by_node_name());

        if plan.is_empty() {
            debug!("All NodeConfigs up to date");
        } else {
            info!(
                "Persisting NodeConfigs: {} to create, {} to update, {} to delete",
                plan.create.len(),
                plan.update.len(),
                plan.delete.len()
            );
            self.apply(plan).await?;
        }

        Ok(Action::requeue(self.resync))
    }

    async fn apply(&self, plan: WritePlan) -> Result<(), ControllerError> {
        let mut errors = Vec::new();

        for (name, spec) in plan.create {
            let config = NodeConfig::new(&name, spec);
            match self.node_config_api.create(&PostParams::default(), &config).await {
                Ok(_) => {
                    info!("Created NodeConfig {}", name);
                    self.stamp_change_time(&name, &mut errors).await;
                }
                Err(e) => {
                    warn!("Failed to create NodeConfig {}: {}", name, e);
                    errors.push(format!("create {}: {}", name, e));
                }
            }
        }

        for (name, spec) in plan.update {
            let patch = json!({ "spec": spec });
            match self
                .node_config_api
                .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
            {
                Ok(_) => {
                    info!("Updated NodeConfig {}", name);
                    self.stamp_change_time(&name, &mut errors).await;
                }
                Err(e) => {
                    warn!("Failed to update NodeConfig {}: {}", name, e);
                    errors.push(format!("update {}: {}", name, e));
                }
            }
        }

        for name in plan.delete {
            match self.node_config_api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => info!("Deleted stale NodeConfig {}", name),
                Err(e) => {
                    warn!("Failed to delete NodeConfig {}: {}", name, e);
                    errors.push(format!("delete {}: {}", name, e));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ControllerError::Persist(errors.join("; ")))
        }
    }

    async fn stamp_change_time(&self, name: &str, errors: &mut Vec<String>) {
        let status_patch = json!({
            "status": {
                "lastChangeTime": Utc::now(),
            }
        });
        let pp = PatchParams::default();
        if let Err(e) = self
            .node_config_api
            .patch_status(name, &pp, &Patch::Merge(&status_patch))
            .await
        {
            warn!("Failed to update NodeConfig {} status: {}", name, e);
            errors.push(format!("status {}: {}", name, e));
        }
    }
}
