//! Kubernetes resource watchers.
//!
//! Cluster resources drive a `kube_runtime::Controller`; ClusterNode changes
//! are mapped to their owning Cluster. Every reconcile recomputes the whole
//! topology, so one reconcile at a time is enough. A periodic resync runs
//! alongside so deletions are pruned even when no Cluster is left to
//! trigger a reconcile.

use crds::{Cluster, ClusterNode};
use futures::StreamExt;
use kube::Api;
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{Controller, controller::{Action, Config as ControllerConfig}, watcher};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use topology::ClusterStore;
use tracing::{debug, error, info, warn};

use crate::error::ControllerError;
use crate::reconciler::Reconciler;

/// Owning cluster of a node, `None` for nodes without one
pub fn cluster_ref(node: ClusterNode) -> Option<ObjectRef<Cluster>> {
    let cluster_name = node.spec.cluster_name.trim();
    if cluster_name.is_empty() {
        return None;
    }
    Some(ObjectRef::new(cluster_name))
}

/// Watches clusters and their nodes until the controller stream ends.
pub async fn watch_topology<S>(
    cluster_api: Api<Cluster>,
    cluster_node_api: Api<ClusterNode>,
    reconciler: Arc<Reconciler<S>>,
    debounce: Duration,
) -> Result<(), ControllerError>
where
    S: ClusterStore + 'static,
{
    info!("Starting Cluster and ClusterNode watchers");

    let error_policy = |cluster: Arc<Cluster>, error: &ControllerError, ctx: Arc<Reconciler<S>>| {
        error!(
            "Reconciliation error for Cluster {}: {}",
            cluster.metadata.name.as_deref().unwrap_or("<unknown>"),
            error
        );
        Action::requeue(ctx.requeue())
    };

    let reconcile = |cluster: Arc<Cluster>, ctx: Arc<Reconciler<S>>| async move {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        debug!("Reconciling Cluster {}", name);
        ctx.reconcile_topology(&format!("Cluster {}", name)).await
    };

    let controller_config = ControllerConfig::default().debounce(debounce).concurrency(1);

    Controller::new(cluster_api, watcher::Config::default())
        .watches(cluster_node_api, watcher::Config::default(), cluster_ref)
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error: {}", e);
            }
        })
        .await;

    Err(ControllerError::Watch("Cluster controller stream ended".to_string()))
}

/// Recomputes the topology every `period`, whether or not any Cluster exists.
pub async fn resync_topology<S>(reconciler: Arc<Reconciler<S>>, period: Duration) -> Result<(), ControllerError>
where
    S: ClusterStore + 'static,
{
    run_resync(period, || {
        let reconciler = reconciler.clone();
        async move { reconciler.reconcile_topology("periodic resync").await }
    })
    .await
}

async fn run_resync<F, Fut>(period: Duration, mut pass: F) -> Result<(), ControllerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Action, ControllerError>>,
{
    info!("Starting topology resync every {:?}", period);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick fires immediately; the watcher's initial list covers it
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = pass().await {
            warn!("Periodic resync failed: {}", e);
        }
    }
}
