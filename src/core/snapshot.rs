//! Environment values captured once per run.

use crate::util::host::{Host, HostCommand};
use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use log::warn;

/// Placeholder shown in operator instructions when no address is known.
pub const UNKNOWN_ADDRESS: &str = "<server-ip>";

#[derive(Debug, Clone)]
pub struct HostSnapshot {
    pub hostname: String,
    pub address: String,
    pub started_at: DateTime<Local>,
}

impl HostSnapshot {
    pub fn capture(host: &dyn Host) -> Result<Self> {
        let hostname = host.hostname()?.trim().to_string();
        if hostname.is_empty() || hostname.contains('/') {
            bail!("unusable hostname {:?}", hostname);
        }
        let address = match primary_address(host) {
            Some(addr) => addr,
            None => {
                warn!("could not determine the primary address; instructions use {}", UNKNOWN_ADDRESS);
                UNKNOWN_ADDRESS.to_string()
            }
        };
        Ok(Self {
            hostname,
            address,
            started_at: Local::now(),
        })
    }

    /// Comment embedded in the generated key.
    pub fn key_comment(&self) -> String {
        format!("{}-{}", self.hostname, self.started_at.format("%Y-%m-%d"))
    }
}

fn primary_address(host: &dyn Host) -> Option<String> {
    let output = host.execute(&HostCommand::new("hostname").arg("-I")).ok()?;
    if !output.success {
        return None;
    }
    output
        .stdout
        .split_whitespace()
        .find(|a| !a.contains(':'))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeHost;
    use tempfile::TempDir;

    #[test]
    fn test_capture_prefers_ipv4() {
        let dir = TempDir::new().unwrap();
        let host = FakeHost::new(dir.path());
        let snap = HostSnapshot::capture(&host).unwrap();
        assert_eq!(snap.hostname, "web1");
        assert_eq!(snap.address, "10.0.0.5");
        assert!(snap.key_comment().starts_with("web1-"));
    }

    #[test]
    fn test_capture_falls_back_to_placeholder() {
        let dir = TempDir::new().unwrap();
        let host = FakeHost::new(dir.path());
        host.fail_on("hostname -I", "not supported");
        let snap = HostSnapshot::capture(&host).unwrap();
        assert_eq!(snap.address, UNKNOWN_ADDRESS);
    }
}
