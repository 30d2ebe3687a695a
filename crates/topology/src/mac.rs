//! MAC address generation for overlay devices

use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh device MAC addresses.
///
/// Only consulted when a node has no prior device of the same name; prior
/// MACs are always carried forward.
pub trait MacGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random locally-administered unicast MACs
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMacGenerator;

impl MacGenerator for RandomMacGenerator {
    fn generate(&self) -> String {
        let mut bytes = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut bytes);
        format_mac(bytes)
    }
}

/// Deterministic generator: `02:00:00:00:00:01`, `02:00:00:00:00:02`, ...
#[derive(Debug, Default)]
pub struct SequentialMacGenerator {
    next: AtomicU64,
}

impl SequentialMacGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MacGenerator for SequentialMacGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let low = n.to_be_bytes();
        format_mac([0, low[3], low[4], low[5], low[6], low[7]])
    }
}

/// Formats six bytes as a MAC, forcing the locally-administered bit on and
/// the multicast bit off in the first octet
pub fn format_mac(mut bytes: [u8; 6]) -> String {
    bytes[0] = (bytes[0] | 0x02) & 0xfe;
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}
