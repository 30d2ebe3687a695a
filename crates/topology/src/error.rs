//! Topology compiler errors

use thiserror::Error;

/// Errors that can occur while compiling the overlay topology
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Reading the cluster/node/config snapshot failed; the whole run is aborted
    #[error("Snapshot read failed: {0}")]
    Snapshot(String),

    /// A CIDR or address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Two addresses that must share a family do not
    #[error("Address family mismatch: {0} and {1}")]
    FamilyMismatch(String, String),

    /// An address pool has no free host left
    #[error("Address pool exhausted: {0}")]
    PoolExhausted(String),

    /// A stage found the pipeline in a state it cannot work with
    #[error("Stage {stage} failed: {reason}")]
    Stage { stage: &'static str, reason: String },

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
