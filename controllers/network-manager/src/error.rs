//! Controller-specific error types.

use kube::Error as KubeError;
use thiserror::Error;
use topology::TopologyError;

/// Errors that can occur in the network manager.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Topology compilation failed
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// One or more NodeConfig writes failed
    #[error("NodeConfig persistence failed: {0}")]
    Persist(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
