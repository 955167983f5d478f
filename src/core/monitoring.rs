//! Monitoring agent installation, configuration and firewall rule.

use crate::constants;
use crate::core::paths::ProvisionPaths;
use crate::core::snapshot::HostSnapshot;
use crate::error::ProvisionError;
use crate::models::config::MonitoringSection;
use crate::util::fs as host_fs;
use crate::util::host::{self, Host, HostCommand};
use crate::util::privilege::Privileged;
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

/// Host firewall front ends, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firewall {
    Firewalld,
    Ufw,
}

impl Firewall {
    pub fn detect(host: &dyn Host) -> Option<Self> {
        if host.has_command("firewall-cmd") {
            Some(Firewall::Firewalld)
        } else if host.has_command("ufw") {
            Some(Firewall::Ufw)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Firewall::Firewalld => "firewalld",
            Firewall::Ufw => "ufw",
        }
    }

    fn open_port(self, host: &dyn Host, port: u16) -> Result<()> {
        let spec = format!("{}/tcp", port);
        match self {
            Firewall::Firewalld => {
                host::run(
                    host,
                    &HostCommand::new("firewall-cmd")
                        .arg("--permanent")
                        .arg(format!("--add-port={}", spec)),
                )?;
                host::run(host, &HostCommand::new("firewall-cmd").arg("--reload"))?;
            }
            Firewall::Ufw => {
                host::run(host, &HostCommand::new("ufw").arg("allow").arg(spec))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MonitoringReport {
    pub package: String,
    pub config: PathBuf,
    pub service: String,
    pub firewall: Option<Firewall>,
}

pub fn setup(
    _cap: Privileged,
    host: &dyn Host,
    paths: &ProvisionPaths,
    snapshot: &HostSnapshot,
    monitoring: &MonitoringSection,
) -> Result<MonitoringReport> {
    let package = install_agent(host, monitoring)?;
    let config = paths.host(agent_config_for(&package));
    configure_agent(&config, &monitoring.server, &snapshot.hostname)?;
    info!("pointed {} at {}", config.display(), monitoring.server);

    let firewall = Firewall::detect(host);
    match firewall {
        Some(fw) => {
            fw.open_port(host, monitoring.port)
                .with_context(|| format!("open port {} with {}", monitoring.port, fw.name()))?;
            info!("opened {}/tcp with {}", monitoring.port, fw.name());
        }
        None => warn!(
            "no supported firewall front end found; open {}/tcp manually if a firewall is active",
            monitoring.port
        ),
    }

    let service = agent_service_for(&package);
    host::systemctl(host, &["enable", "--now", &service])?;
    host::systemctl(host, &["restart", &service])?;
    if !host::is_active(host, &service) {
        return Err(ProvisionError::CommandFailed {
            command: format!("systemctl is-active {}", service),
            output: "agent is not running".to_string(),
        }
        .into());
    }
    info!("{} enabled and running", service);

    Ok(MonitoringReport {
        package,
        config,
        service,
        firewall,
    })
}

/// Install the preferred package, falling back to the alternate one.
fn install_agent(host: &dyn Host, monitoring: &MonitoringSection) -> Result<String> {
    let install = |package: &str| {
        host::run(
            host,
            &HostCommand::new("apt-get")
                .args(["install", "-y", package])
                .env("DEBIAN_FRONTEND", "noninteractive"),
        )
    };
    match install(&monitoring.package) {
        Ok(_) => Ok(monitoring.package.clone()),
        Err(e) => {
            warn!(
                "{} unavailable ({:#}); trying {}",
                monitoring.package, e, monitoring.fallback_package
            );
            install(&monitoring.fallback_package).context("install monitoring agent")?;
            Ok(monitoring.fallback_package.clone())
        }
    }
}

fn agent_config_for(package: &str) -> &'static str {
    constants::AGENT_CONFIGS
        .iter()
        .find(|(p, _)| *p == package)
        .map(|(_, path)| *path)
        .unwrap_or("/etc/zabbix/zabbix_agentd.conf")
}

fn agent_service_for(package: &str) -> String {
    constants::AGENT_SERVICES
        .iter()
        .find(|(p, _)| *p == package)
        .map(|(_, unit)| unit.to_string())
        .unwrap_or_else(|| package.to_string())
}

/// Set `Key=value` on the first active or commented line, else append.
pub fn set_agent_option(content: &str, key: &str, value: &str) -> String {
    let wanted = format!("{}={}", key, value);
    let matches_key = |line: &str| {
        let line = line.trim_start().trim_start_matches('#').trim_start();
        line.split_once('=').is_some_and(|(k, _)| k.trim() == key)
    };
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let active = lines
        .iter()
        .position(|l| !l.trim_start().starts_with('#') && matches_key(l.as_str()));
    let target = active.or_else(|| lines.iter().position(|l| matches_key(l.as_str())));
    match target {
        Some(idx) => lines[idx] = wanted,
        None => lines.push(wanted),
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn configure_agent(config: &std::path::Path, server: &str, hostname: &str) -> Result<()> {
    let mut content = fs::read_to_string(config).unwrap_or_default();
    for (key, value) in [("Server", server), ("ServerActive", server), ("Hostname", hostname)] {
        content = set_agent_option(&content, key, value);
    }
    let mode = host_fs::mode_of(config).unwrap_or(0o644);
    host_fs::write_atomic(config, &content, mode)
}
