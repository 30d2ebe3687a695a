//! Mock NetworkBackend for unit testing
//!
//! Keeps the host state in memory, records every applied operation in order
//! and can be told to fail loads or whole operation classes.

use async_trait::async_trait;
use crds::{Arp, Device, Fdb, Iptables, NodeConfigSpec, Route};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{NetworkBackend, ResourceKind};
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Delete,
}

/// One applied item, in the order the backend saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub action: Action,
    pub kind: ResourceKind,
    pub key: String,
}

#[derive(Debug, Clone, Default)]
pub struct MockNetworkBackend {
    state: Arc<Mutex<NodeConfigSpec>>,
    operations: Arc<Mutex<Vec<Operation>>>,
    load_failure: Arc<Mutex<Option<String>>>,
    failing: Arc<Mutex<HashSet<(Action, ResourceKind)>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockNetworkBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an already populated host
    pub fn with_state(state: NodeConfigSpec) -> Self {
        let backend = Self::new();
        *lock(&backend.state) = state;
        backend
    }

    /// Current host state
    pub fn state(&self) -> NodeConfigSpec {
        lock(&self.state).clone()
    }

    /// Replaces the host state without recording operations (simulates drift)
    pub fn set_state(&self, state: NodeConfigSpec) {
        *lock(&self.state) = state;
    }

    pub fn operations(&self) -> Vec<Operation> {
        lock(&self.operations).clone()
    }

    pub fn clear_operations(&self) {
        lock(&self.operations).clear();
    }

    /// Makes `load_actual_state` fail with `reason`, or succeed again with `None`
    pub fn fail_load(&self, reason: Option<&str>) {
        *lock(&self.load_failure) = reason.map(str::to_string);
    }

    /// Makes every item of the given action and kind fail
    pub fn fail_on(&self, action: Action, kind: ResourceKind) {
        lock(&self.failing).insert((action, kind));
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
        *lock(&self.load_failure) = None;
    }

    fn apply<T, F>(
        &self,
        action: Action,
        kind: ResourceKind,
        items: &[T],
        key_of: impl Fn(&T) -> String,
        select: F,
    ) -> Result<(), BackendError>
    where
        T: Clone + PartialEq,
        F: Fn(&mut NodeConfigSpec) -> &mut Vec<T>,
    {
        let failing = lock(&self.failing).contains(&(action, kind));
        let mut errors = Vec::new();
        let mut state = lock(&self.state);
        let mut operations = lock(&self.operations);

        for item in items {
            let key = key_of(item);
            if failing {
                errors.push(format!("{:?} {} {}: injected failure", action, kind, key));
                continue;
            }
            let list = select(&mut *state);
            match action {
                Action::Add => {
                    if !list.contains(item) {
                        list.push(item.clone());
                    }
                }
                Action::Delete => list.retain(|existing| existing != item),
            }
            operations.push(Operation { action, kind, key });
        }

        BackendError::from_batch(errors)
    }
}

fn device_key(d: &Device) -> String {
    d.name.clone()
}

fn route_key(r: &Route) -> String {
    format!("{} via {} dev {}", r.cidr, r.gw, r.dev)
}

fn iptables_key(r: &Iptables) -> String {
    format!("{} {} {}", r.table, r.chain, r.rule)
}

fn fdb_key(f: &Fdb) -> String {
    format!("{} {} dst {}", f.dev, f.mac, f.ip)
}

fn arp_key(a: &Arp) -> String {
    format!("{} {} lladdr {}", a.dev, a.ip, a.mac)
}

#[async_trait]
impl NetworkBackend for MockNetworkBackend {
    async fn load_actual_state(&self) -> Result<NodeConfigSpec, BackendError> {
        if let Some(reason) = lock(&self.load_failure).clone() {
            return Err(BackendError::Command {
                command: "load".to_string(),
                stderr: reason,
            });
        }
        Ok(self.state())
    }

    async fn add_devices(&self, devices: &[Device]) -> Result<(), BackendError> {
        self.apply(Action::Add, ResourceKind::Device, devices, device_key, |s| &mut s.devices)
    }

    async fn delete_devices(&self, devices: &[Device]) -> Result<(), BackendError> {
        self.apply(Action::Delete, ResourceKind::Device, devices, device_key, |s| &mut s.devices)
    }

    async fn add_routes(&self, routes: &[Route]) -> Result<(), BackendError> {
        self.apply(Action::Add, ResourceKind::Route, routes, route_key, |s| &mut s.routes)
    }

    async fn delete_routes(&self, routes: &[Route]) -> Result<(), BackendError> {
        self.apply(Action::Delete, ResourceKind::Route, routes, route_key, |s| &mut s.routes)
    }

    async fn add_iptables(&self, rules: &[Iptables]) -> Result<(), BackendError> {
        self.apply(Action::Add, ResourceKind::Iptables, rules, iptables_key, |s| &mut s.iptables)
    }

    async fn delete_iptables(&self, rules: &[Iptables]) -> Result<(), BackendError> {
        self.apply(Action::Delete, ResourceKind::Iptables, rules, iptables_key, |s| &mut s.iptables)
    }

    async fn add_fdbs(&self, fdbs: &[Fdb]) -> Result<(), BackendError> {
        self.apply(Action::Add, ResourceKind::Fdb, fdbs, fdb_key, |s| &mut s.fdbs)
    }

    async fn delete_fdbs(&self, fdbs: &[Fdb]) -> Result<(), BackendError> {
        self.apply(Action::Delete, ResourceKind::Fdb, fdbs, fdb_key, |s| &mut s.fdbs)
    }

    async fn add_arps(&self, arps: &[Arp]) -> Result<(), BackendError> {
        self.apply(Action::Add, ResourceKind::Arp, arps, arp_key, |s| &mut s.arps)
    }

    async fn delete_arps(&self, arps: &[Arp]) -> Result<(), BackendError> {
        self.apply(Action::Delete, ResourceKind::Arp, arps, arp_key, |s| &mut s.arps)
    }
}
