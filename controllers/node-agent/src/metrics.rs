//! Prometheus metrics and probe endpoints
//!
//! Exported metrics:
//! - `node_agent_syncs_total` (counter): convergence passes labeled by result.
//! - `node_agent_sync_status` (gauge): 1 when the last pass succeeded, 0 otherwise.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::AgentError;
use crate::sync::SyncStatus;

pub struct AgentMetrics {
    registry: Registry,
    syncs: IntCounterVec,
    status: IntGauge,
}

impl AgentMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let syncs = IntCounterVec::new(
            Opts::new("node_agent_syncs_total", "Convergence passes by result"),
            &["result"],
        )?;
        let status = IntGauge::new("node_agent_sync_status", "1 when the last convergence pass succeeded")?;

        registry.register(Box::new(syncs.clone()))?;
        registry.register(Box::new(status.clone()))?;

        Ok(Self { registry, syncs, status })
    }

    pub fn observe(&self, status: &SyncStatus) {
        let (result, value) = match status {
            SyncStatus::Success => ("success", 1),
            SyncStatus::Exception(_) => ("exception", 0),
        };
        self.syncs.with_label_values(&[result]).inc();
        self.status.set(value);
    }

    /// Registry contents in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

async fn metrics_handler(State(metrics): State<Arc<AgentMetrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(metrics: Arc<AgentMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .with_state(metrics)
}

/// Serves `/metrics` and `/healthz` on `addr` until the listener fails
pub async fn serve(addr: SocketAddr, metrics: Arc<AgentMetrics>) -> Result<(), AgentError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}
