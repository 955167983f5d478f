//! Access bootstrap: open root and password login so the operator can reach
//! the host while keys are being set up.

use crate::core::paths::ProvisionPaths;
use crate::core::sshd_config;
use crate::util::host::{self, Host};
use crate::util::privilege::Privileged;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;

const PERMISSIVE: &[(&str, &str)] = &[("PermitRootLogin", "yes"), ("PasswordAuthentication", "yes")];

#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    /// Files rewritten, base file first.
    pub changed: Vec<PathBuf>,
    /// Whether an earlier hardening fragment keeps overriding the base file.
    pub fragment_present: bool,
}

pub fn open_access(
    _cap: Privileged,
    host: &dyn Host,
    paths: &ProvisionPaths,
    service: &str,
) -> Result<BootstrapReport> {
    let mut report = BootstrapReport::default();

    let mut base_changed = false;
    for (key, value) in PERMISSIVE {
        base_changed |= sshd_config::apply_directive(&paths.sshd_config, key, value)?;
    }
    if base_changed {
        report.changed.push(paths.sshd_config.clone());
    }

    for dropin in foreign_dropins(paths)? {
        let content = fs::read_to_string(&dropin)
            .with_context(|| format!("read {}", dropin.display()))?;
        let mut touched = false;
        for (key, value) in PERMISSIVE {
            if sshd_config::defines(&content, key) {
                touched |= sshd_config::apply_directive(&dropin, key, value)?;
            }
        }
        if touched {
            debug!("overrode drop-in {}", dropin.display());
            report.changed.push(dropin);
        }
    }

    report.fragment_present = paths.hardening_fragment.exists();
    if report.fragment_present {
        warn!(
            "{} is present from an earlier run; root and password login stay disabled",
            paths.hardening_fragment.display()
        );
    }

    host::systemctl(host, &["restart", service])?;
    info!("root and password login enabled; {} restarted", service);
    Ok(report)
}

/// Drop-ins in the include directory other than our own fragment, sorted.
fn foreign_dropins(paths: &ProvisionPaths) -> Result<Vec<PathBuf>> {
    if !paths.sshd_config_dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = paths.sshd_config_dir.join("*.conf");
    let mut found: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .with_context(|| format!("list {}", paths.sshd_config_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file() && *p != paths.hardening_fragment)
        .collect();
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeHost;
    use tempfile::TempDir;

    fn fixture(base: &str) -> (TempDir, ProvisionPaths, FakeHost) {
        let dir = TempDir::new().unwrap();
        let paths = ProvisionPaths::from_root(dir.path().to_path_buf());
        fs::create_dir_all(&paths.sshd_config_dir).unwrap();
        fs::write(&paths.sshd_config, base).unwrap();
        let host = FakeHost::new(dir.path());
        (dir, paths, host)
    }

    fn effective(paths: &ProvisionPaths, key: &str) -> Option<String> {
        sshd_config::effective_value(&paths.root, &paths.sshd_config, key).unwrap()
    }

    #[test]
    fn test_uncomments_stock_defaults() {
        let (_dir, paths, host) = fixture(
            "Include /etc/ssh/sshd_config.d/*.conf\n#PermitRootLogin prohibit-password\n#PasswordAuthentication yes\n",
        );
        let report = open_access(Privileged::for_tests(), &host, &paths, "ssh").unwrap();
        assert_eq!(report.changed, vec![paths.sshd_config.clone()]);
        assert!(!report.fragment_present);
        assert_eq!(effective(&paths, "PermitRootLogin").as_deref(), Some("yes"));
        assert_eq!(effective(&paths, "PasswordAuthentication").as_deref(), Some("yes"));
        assert!(host.ran("systemctl restart ssh"));
    }

    #[test]
    fn test_overrides_cloud_image_dropin() {
        let (_dir, paths, host) = fixture("Include /etc/ssh/sshd_config.d/*.conf\n");
        let cloud = paths.sshd_config_dir.join("50-cloud-init.conf");
        fs::write(&cloud, "PasswordAuthentication no\n").unwrap();
        let other = paths.sshd_config_dir.join("60-banner.conf");
        fs::write(&other, "Banner none\n").unwrap();

        let report = open_access(Privileged::for_tests(), &host, &paths, "ssh").unwrap();
        assert!(report.changed.contains(&cloud));
        assert!(!report.changed.contains(&other));
        assert_eq!(fs::read_to_string(&cloud).unwrap(), "PasswordAuthentication yes\n");
        assert_eq!(effective(&paths, "PasswordAuthentication").as_deref(), Some("yes"));
    }

    #[test]
    fn test_existing_fragment_is_left_alone() {
        let (_dir, paths, host) = fixture("Include /etc/ssh/sshd_config.d/*.conf\n");
        fs::write(&paths.hardening_fragment, "PermitRootLogin no\n").unwrap();
        let report = open_access(Privileged::for_tests(), &host, &paths, "ssh").unwrap();
        assert!(report.fragment_present);
        assert_eq!(
            fs::read_to_string(&paths.hardening_fragment).unwrap(),
            "PermitRootLogin no\n"
        );
        assert_eq!(effective(&paths, "PermitRootLogin").as_deref(), Some("no"));
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let (_dir, paths, host) = fixture("PermitRootLogin yes\nPasswordAuthentication yes\n");
        let report = open_access(Privileged::for_tests(), &host, &paths, "ssh").unwrap();
        assert!(report.changed.is_empty());
    }

    #[test]
    fn test_restart_failure_is_fatal() {
        let (_dir, paths, host) = fixture("");
        host.fail_on("systemctl restart ssh", "Job for ssh.service failed");
        assert!(open_access(Privileged::for_tests(), &host, &paths, "ssh").is_err());
    }
}
