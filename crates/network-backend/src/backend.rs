//! NetworkBackend trait
//!
//! The node agent only talks to the host through this trait. The command
//! backend implements it on Linux; tests use the in-memory mock.

use async_trait::async_trait;
use crds::{Arp, Device, Fdb, Iptables, NodeConfigSpec, Route};
use std::fmt;

use crate::error::BackendError;

/// The five resource classes a NodeConfig manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Device,
    Route,
    Iptables,
    Fdb,
    Arp,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Device => write!(f, "device"),
            ResourceKind::Route => write!(f, "route"),
            ResourceKind::Iptables => write!(f, "iptables"),
            ResourceKind::Fdb => write!(f, "fdb"),
            ResourceKind::Arp => write!(f, "arp"),
        }
    }
}

/// Host network operations used by the convergence engine.
///
/// Batch methods attempt every item even when an earlier one fails and
/// report the failures together as [`BackendError::Batch`].
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Reads the overlay resources currently present on the host
    async fn load_actual_state(&self) -> Result<NodeConfigSpec, BackendError>;

    async fn add_devices(&self, devices: &[Device]) -> Result<(), BackendError>;
    async fn delete_devices(&self, devices: &[Device]) -> Result<(), BackendError>;

    async fn add_routes(&self, routes: &[Route]) -> Result<(), BackendError>;
    async fn delete_routes(&self, routes: &[Route]) -> Result<(), BackendError>;

    async fn add_iptables(&self, rules: &[Iptables]) -> Result<(), BackendError>;
    async fn delete_iptables(&self, rules: &[Iptables]) -> Result<(), BackendError>;

    async fn add_fdbs(&self, fdbs: &[Fdb]) -> Result<(), BackendError>;
    async fn delete_fdbs(&self, fdbs: &[Fdb]) -> Result<(), BackendError>;

    async fn add_arps(&self, arps: &[Arp]) -> Result<(), BackendError>;
    async fn delete_arps(&self, arps: &[Arp]) -> Result<(), BackendError>;
}
