//! ClusterLink CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by the network manager
//! (which computes per-node configuration) and the node agent (which applies it).

pub mod cluster;
pub mod cluster_node;
pub mod constants;
pub mod node_config;

pub use cluster::*;
pub use cluster_node::*;
pub use node_config::*;
