//! Main agent implementation.
//!
//! Wires the command backend, the convergence engine, the NodeConfig
//! watcher, the drift checker and the metrics server together.

use crds::NodeConfig;
use kube::{Api, Client};
use network_backend::CommandBackend;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::checker::run_checker;
use crate::debounce::Debouncer;
use crate::error::AgentError;
use crate::metrics::{self, AgentMetrics};
use crate::sync::NetworkManager;
use crate::watcher::Watcher;

/// Runtime settings of the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub node_name: String,
    pub debounce: Duration,
    pub check_interval: Duration,
    pub metrics_addr: SocketAddr,
}

/// Node agent.
pub struct Controller {
    manager: Arc<NetworkManager>,
    watcher: JoinHandle<Result<(), AgentError>>,
    metrics_server: JoinHandle<Result<(), AgentError>>,
    checker: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Controller {
    /// Creates a new agent instance and starts its background tasks.
    pub async fn new(config: AgentConfig) -> Result<Self, AgentError> {
        info!("Initializing node agent for {}", config.node_name);

        let kube_client = Client::try_default().await?;
        let node_config_api: Api<NodeConfig> = Api::all(kube_client);

        let metrics = Arc::new(AgentMetrics::new()?);
        let manager = Arc::new(NetworkManager::new(Arc::new(CommandBackend::new())).with_metrics(metrics.clone()));

        let watcher_instance = Watcher::new(
            manager.clone(),
            node_config_api,
            Debouncer::new(config.debounce),
            config.node_name,
        );
        let (shutdown, shutdown_rx) = watch::channel(false);

        let watcher = tokio::spawn(async move { watcher_instance.watch_node_config().await });
        let checker = tokio::spawn(run_checker(manager.clone(), config.check_interval, shutdown_rx));
        let metrics_server = tokio::spawn(metrics::serve(config.metrics_addr, metrics));

        Ok(Self {
            manager,
            watcher,
            metrics_server,
            checker,
            shutdown,
        })
    }

    /// Runs the agent until Ctrl-C or until a background task fails.
    pub async fn run(mut self) -> Result<(), AgentError> {
        info!("Node agent running");

        let result = tokio::select! {
            result = &mut self.watcher => {
                result
                    .map_err(|e| AgentError::Watch(format!("NodeConfig watcher panicked: {}", e)))
                    .and_then(|inner| inner)
            }
            result = &mut self.metrics_server => {
                result
                    .map_err(|e| AgentError::Watch(format!("Metrics server panicked: {}", e)))
                    .and_then(|inner| inner)
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        // lets a running drift check finish before the process exits
        if self.shutdown.send(true).is_err() {
            warn!("Drift checker already stopped");
        }
        if let Err(e) = (&mut self.checker).await {
            warn!("Drift checker panicked: {}", e);
        }
        info!("Node agent stopped, last sync status: {}", self.manager.status().await);

        result
    }
}
