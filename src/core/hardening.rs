//! Hardening commit: switch the SSH daemon to key-only, no-root access.
//!
//! Order: backup, include, fragment, `sshd -t`, effective-value check,
//! base-file edit, restart, liveness probe. A rejected or ineffective
//! configuration leaves the host as it was before the attempt.

use crate::constants;
use crate::core::gate::GatePassed;
use crate::core::paths::ProvisionPaths;
use crate::core::snapshot::HostSnapshot;
use crate::core::sshd_config;
use crate::error::ProvisionError;
use crate::models::policy::HardeningPolicy;
use crate::util::fs as host_fs;
use crate::util::host::{self, Host, HostCommand};
use crate::util::privilege::Privileged;
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Values the daemon must end up with once the fragment is in place.
const ENFORCED: &[(&str, &str)] = &[("PermitRootLogin", "no"), ("PasswordAuthentication", "no")];

/// Fragment left by an earlier run, restored if this attempt is rolled back.
struct PriorFragment {
    content: String,
    mode: u32,
}

#[derive(Debug, Clone)]
pub struct HardeningReport {
    pub backup: PathBuf,
    pub fragment: PathBuf,
    pub include_added: bool,
    pub probes: u32,
}

pub fn commit(
    _cap: Privileged,
    host: &dyn Host,
    paths: &ProvisionPaths,
    snapshot: &HostSnapshot,
    policy: &HardeningPolicy,
    service: &str,
    _passed: GatePassed,
) -> Result<HardeningReport> {
    let backup = paths.sshd_backup(&snapshot.started_at);
    fs::copy(&paths.sshd_config, &backup).with_context(|| {
        format!(
            "back up {} to {}",
            paths.sshd_config.display(),
            backup.display()
        )
    })?;
    info!("backed up {} to {}", paths.sshd_config.display(), backup.display());

    let prior = read_prior_fragment(&paths.hardening_fragment)?;
    let include_added = sshd_config::ensure_include(&paths.sshd_config)?;
    if include_added {
        info!(
            "placed `{}` at the top of {}",
            sshd_config::include_line(),
            paths.sshd_config.display()
        );
    }

    host_fs::ensure_dir(&paths.sshd_config_dir, 0o755)?;
    host_fs::write_atomic(
        &paths.hardening_fragment,
        &sshd_config::render_fragment(policy),
        constants::SSHD_FRAGMENT_MODE,
    )?;
    info!("wrote {}", paths.hardening_fragment.display());

    if let Err(output) = validate(host, paths) {
        rollback(paths, &backup, include_added, prior.as_ref());
        return Err(ProvisionError::ValidationFailed { output }.into());
    }
    info!("sshd accepted the hardened configuration");

    if let Err(e) = verify_enforced(paths) {
        rollback(paths, &backup, include_added, prior.as_ref());
        return Err(e);
    }

    sshd_config::apply_directive(&paths.sshd_config, "PermitEmptyPasswords", "no")?;

    host::systemctl(host, &["restart", service])?;
    let probes = wait_until_active(host, service, policy)?;
    info!("{} restarted and active", service);

    Ok(HardeningReport {
        backup,
        fragment: paths.hardening_fragment.clone(),
        include_added,
        probes,
    })
}

/// Run `sshd -t` against the base file; `Err` carries the validator output.
fn validate(host: &dyn Host, paths: &ProvisionPaths) -> std::result::Result<(), String> {
    let cmd = HostCommand::new("sshd")
        .arg("-t")
        .arg("-f")
        .arg(paths.sshd_config.to_string_lossy());
    match host.execute(&cmd) {
        Ok(out) if out.success => Ok(()),
        Ok(out) => Err(out.combined()),
        Err(e) => Err(format!("{:#}", e)),
    }
}

fn read_prior_fragment(path: &Path) -> Result<Option<PriorFragment>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mode = host_fs::mode_of(path).unwrap_or(constants::SSHD_FRAGMENT_MODE);
    Ok(Some(PriorFragment { content, mode }))
}

/// Fail unless the resolved configuration disables root and password login.
fn verify_enforced(paths: &ProvisionPaths) -> Result<()> {
    let directives = sshd_config::resolved_directives(&paths.root, &paths.sshd_config)?;
    for (key, wanted) in ENFORCED {
        let found = directives.iter().find(|d| d.key.eq_ignore_ascii_case(key));
        let (value, source) = match found {
            Some(d) if d.value.eq_ignore_ascii_case(wanted) => continue,
            Some(d) => (d.value.clone(), d.source.as_path()),
            None => ("(sshd default)".to_string(), paths.sshd_config.as_path()),
        };
        return Err(ProvisionError::NotEnforced {
            key: key.to_string(),
            value,
            source_file: paths.to_host(source).display().to_string(),
        }
        .into());
    }
    Ok(())
}

fn rollback(
    paths: &ProvisionPaths,
    backup: &Path,
    include_added: bool,
    prior: Option<&PriorFragment>,
) {
    let fragment = &paths.hardening_fragment;
    match prior {
        Some(prior) => match host_fs::write_atomic(fragment, &prior.content, prior.mode) {
            Ok(()) => warn!("restored previous {}", fragment.display()),
            Err(e) => warn!("could not restore {}: {:#}", fragment.display(), e),
        },
        None => match fs::remove_file(fragment) {
            Ok(()) => warn!("removed rejected fragment {}", fragment.display()),
            Err(e) => warn!("could not remove {}: {}", fragment.display(), e),
        },
    }
    if include_added {
        if let Err(e) = fs::copy(backup, &paths.sshd_config) {
            warn!("could not restore {}: {}", paths.sshd_config.display(), e);
        }
    }
}

/// Poll `systemctl is-active` until the daemon reports active.
fn wait_until_active(host: &dyn Host, service: &str, policy: &HardeningPolicy) -> Result<u32> {
    let attempts = policy.liveness_attempts.max(1);
    for attempt in 1..=attempts {
        if host::is_active(host, service) {
            return Ok(attempt);
        }
        if attempt < attempts {
            host.sleep(Duration::from_millis(policy.liveness_interval_ms));
        }
    }
    Err(ProvisionError::DaemonNotLive {
        service: service.to_string(),
    }
    .into())
}
