//! Overlay topology compiler
//!
//! Turns a snapshot of clusters, cluster nodes and previously written
//! NodeConfigs into the desired overlay network state of every node:
//! VXLAN devices, routes, NAT rules and static FDB/ARP entries.
//!
//! # Example
//!
//! ```no_run
//! use topology::{ConfigManager, Snapshot};
//!
//! # fn example(snapshot: Snapshot) -> Result<(), topology::TopologyError> {
//! let mut manager = ConfigManager::default();
//! manager.calculate(snapshot)?;
//! for config in manager.configs() {
//!     println!("{:?}", config.spec.devices);
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod allocation;
pub mod error;
pub mod filter;
pub mod mac;
pub mod manager;
pub mod routes;
pub mod sort;
pub mod stages;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use error::TopologyError;
pub use filter::TopologyFilter;
pub use mac::{MacGenerator, RandomMacGenerator, SequentialMacGenerator};
pub use manager::ConfigManager;
pub use store::{ClusterStore, Snapshot};
