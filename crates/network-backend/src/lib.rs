//! Host network backend
//!
//! Reads and changes the overlay state of one Linux host: VXLAN devices,
//! routes, NAT rules, FDB and neighbour entries.
//!
//! # Features
//!
//! - **`CommandBackend`**: drives `ip`, `bridge`, `iptables` and `ip6tables`
//! - **`MockNetworkBackend`** (feature `test-util`): in-memory state with an
//!   operation log and failure injection

pub mod backend;
pub mod command;
pub mod error;
pub mod parse;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use backend::{NetworkBackend, ResourceKind};
pub use command::CommandBackend;
pub use error::BackendError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{Action, MockNetworkBackend, Operation};
