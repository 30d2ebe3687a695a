//! Command-line network backend
//!
//! Uses `ip`, `bridge`, `iptables` and `ip6tables` to read and change the
//! overlay state of the host. Every item of a batch is applied with its own
//! command so one failure does not hide the others.

use async_trait::async_trait;
use crds::constants::NAT_TABLE;
use crds::{Arp, Device, Fdb, Iptables, NodeConfigSpec, Route};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::backend::NetworkBackend;
use crate::error::BackendError;
use crate::parse;

/// Tables scanned for rules owned by the agent
const MANAGED_TABLES: [&str; 1] = [NAT_TABLE];

#[derive(Debug, Clone)]
pub struct CommandBackend {
    ip_path: String,
    bridge_path: String,
    iptables_path: String,
    ip6tables_path: String,
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBackend {
    pub fn new() -> Self {
        Self {
            ip_path: "ip".to_string(),
            bridge_path: "bridge".to_string(),
            iptables_path: "iptables".to_string(),
            ip6tables_path: "ip6tables".to_string(),
        }
    }

    /// Runs a command and returns its stdout
    async fn exec(&self, cmd: &str, args: &[&str]) -> Result<String, BackendError> {
        trace!(cmd = cmd, args = ?args, "Executing command");

        let output = Command::new(cmd).args(args).output().await?;
        if !output.status.success() {
            return Err(BackendError::Command {
                command: format!("{} {}", cmd, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Runs one command per item, collecting the failures
    async fn exec_each<T>(
        &self,
        items: &[T],
        command: impl Fn(&T) -> (String, Vec<String>),
    ) -> Result<(), BackendError> {
        let mut errors = Vec::new();
        for item in items {
            let (cmd, args) = command(item);
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            if let Err(e) = self.exec(&cmd, &args).await {
                warn!("{}", e);
                errors.push(e.to_string());
            }
        }
        BackendError::from_batch(errors)
    }

    fn iptables_cmd(&self, rule: &Iptables) -> &str {
        if parse::is_ipv6_rule(&rule.rule) {
            &self.ip6tables_path
        } else {
            &self.iptables_path
        }
    }

    fn iptables_args(flag: &str, rule: &Iptables) -> Vec<String> {
        let mut args = vec![
            "-t".to_string(),
            rule.table.clone(),
            flag.to_string(),
            rule.chain.clone(),
        ];
        args.extend(parse::tagged_rule_args(&rule.rule));
        args
    }

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }
}

#[async_trait]
impl NetworkBackend for CommandBackend {
    async fn load_actual_state(&self) -> Result<NodeConfigSpec, BackendError> {
        let devices = parse::parse_devices(&self.exec(&self.ip_path, &["-j", "-d", "addr", "show"]).await?)?;

        let mut routes = parse::parse_routes(&self.exec(&self.ip_path, &["-j", "route", "show"]).await?, false)?;
        routes.extend(parse::parse_routes(
            &self.exec(&self.ip_path, &["-j", "-6", "route", "show"]).await?,
            true,
        )?);

        let fdbs = parse::parse_fdbs(&self.exec(&self.bridge_path, &["-j", "fdb", "show"]).await?)?;
        let arps = parse::parse_arps(&self.exec(&self.ip_path, &["-j", "neigh", "show"]).await?)?;

        let mut iptables = Vec::new();
        for table in MANAGED_TABLES {
            let output = self.exec(&self.iptables_path, &["-t", table, "-S"]).await?;
            iptables.extend(parse::parse_iptables(&output, table));

            // hosts without ip6tables or its nat table have no IPv6 rules to manage
            match self.exec(&self.ip6tables_path, &["-t", table, "-S"]).await {
                Ok(output) => iptables.extend(parse::parse_iptables(&output, table)),
                Err(e) => warn!("IPv6 {} rules unavailable, treating as empty: {}", table, e),
            }
        }

        debug!(
            "Loaded host state: {} devices, {} routes, {} iptables, {} fdbs, {} arps",
            devices.len(),
            routes.len(),
            iptables.len(),
            fdbs.len(),
            arps.len()
        );
        Ok(NodeConfigSpec {
            devices,
            routes,
            iptables,
            fdbs,
            arps,
        })
    }

    async fn add_devices(&self, devices: &[Device]) -> Result<(), BackendError> {
        let mut errors = Vec::new();
        for device in devices {
            let id = device.id.to_string();
            let port = device.port.to_string();
            let steps: [Vec<&str>; 3] = [
                vec![
                    "link", "add", device.name.as_str(), "address", device.mac.as_str(), "type", "vxlan", "id", id.as_str(),
                    "dev", device.bind_dev.as_str(), "dstport", port.as_str(), "nolearning",
                ],
                vec!["addr", "add", device.addr.as_str(), "dev", device.name.as_str()],
                vec!["link", "set", device.name.as_str(), "up"],
            ];
            for step in steps {
                if let Err(e) = self.exec(&self.ip_path, &step).await {
                    warn!("Device {}: {}", device.name, e);
                    errors.push(e.to_string());
                    break;
                }
            }
        }
        BackendError::from_batch(errors)
    }

    async fn delete_devices(&self, devices: &[Device]) -> Result<(), BackendError> {
        self.exec_each(devices, |d| (self.ip_path.clone(), Self::args(&["link", "del", d.name.as_str()])))
            .await
    }

    async fn add_routes(&self, routes: &[Route]) -> Result<(), BackendError> {
        self.exec_each(routes, |r| {
            (
                self.ip_path.clone(),
                Self::args(&["route", "replace", r.cidr.as_str(), "via", r.gw.as_str(), "dev", r.dev.as_str(), "onlink"]),
            )
        })
        .await
    }

    async fn delete_routes(&self, routes: &[Route]) -> Result<(), BackendError> {
        self.exec_each(routes, |r| {
            (
                self.ip_path.clone(),
                Self::args(&["route", "del", r.cidr.as_str(), "via", r.gw.as_str(), "dev", r.dev.as_str()]),
            )
        })
        .await
    }

    async fn add_iptables(&self, rules: &[Iptables]) -> Result<(), BackendError> {
        self.exec_each(rules, |r| (self.iptables_cmd(r).to_string(), Self::iptables_args("-A", r)))
            .await
    }

    async fn delete_iptables(&self, rules: &[Iptables]) -> Result<(), BackendError> {
        self.exec_each(rules, |r| (self.iptables_cmd(r).to_string(), Self::iptables_args("-D", r)))
            .await
    }

    async fn add_fdbs(&self, fdbs: &[Fdb]) -> Result<(), BackendError> {
        self.exec_each(fdbs, |f| {
            (
                self.bridge_path.clone(),
                Self::args(&["fdb", "append", f.mac.as_str(), "dev", f.dev.as_str(), "dst", f.ip.as_str()]),
            )
        })
        .await
    }

    async fn delete_fdbs(&self, fdbs: &[Fdb]) -> Result<(), BackendError> {
        self.exec_each(fdbs, |f| {
            (
                self.bridge_path.clone(),
                Self::args(&["fdb", "del", f.mac.as_str(), "dev", f.dev.as_str(), "dst", f.ip.as_str()]),
            )
        })
        .await
    }

    async fn add_arps(&self, arps: &[Arp]) -> Result<(), BackendError> {
        self.exec_each(arps, |a| {
            (
                self.ip_path.clone(),
                Self::args(&["neigh", "replace", a.ip.as_str(), "lladdr", a.mac.as_str(), "dev", a.dev.as_str(), "nud", "permanent"]),
            )
        })
        .await
    }

    async fn delete_arps(&self, arps: &[Arp]) -> Result<(), BackendError> {
        self.exec_each(arps, |a| {
            (self.ip_path.clone(), Self::args(&["neigh", "del", a.ip.as_str(), "dev", a.dev.as_str()]))
        })
        .await
    }
}
