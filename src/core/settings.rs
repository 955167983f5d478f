//! Loading and saving the provisioning configuration file.

use crate::models::config::ProvisionConfig;
use crate::util::fs as host_fs;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Load the configuration; a missing file means defaults.
pub fn load(path: &Path) -> Result<ProvisionConfig> {
    if !path.exists() {
        return Ok(ProvisionConfig::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ProvisionConfig =
        toml::from_str(&content).with_context(|| format!("parse config {}", path.display()))?;
    check(&config)?;
    Ok(config)
}

pub fn render(config: &ProvisionConfig) -> Result<String> {
    toml::to_string_pretty(config).context("serialize config")
}

pub fn save(path: &Path, config: &ProvisionConfig) -> Result<()> {
    let content = render(config)?;
    host_fs::write_atomic(path, &content, 0o644)
}

fn check(config: &ProvisionConfig) -> Result<()> {
    if config.ssh.confirm_token.trim().is_empty() {
        bail!("ssh.confirm_token must not be empty");
    }
    if config.ssh.service.trim().is_empty() {
        bail!("ssh.service must not be empty");
    }
    if config.hardening.liveness_attempts == 0 {
        bail!("hardening.liveness_attempts must be at least 1");
    }
    if config.monitoring.enabled && config.monitoring.port == 0 {
        bail!("monitoring.port must not be 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::state::SshProfile;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ssh.profile, SshProfile::Hardened);
        assert_eq!(config.ssh.confirm_token, "CONFIRMED");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("provision.toml");
        fs::write(
            &path,
            "[ssh]\nprofile = \"keys\"\naccount = \"ops\"\n\n[monitoring]\nserver = \"10.2.0.1\"\n",
        )
        .unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.ssh.profile, SshProfile::Keys);
        assert_eq!(config.ssh.account, "ops");
        assert_eq!(config.ssh.shell, "/bin/bash");
        assert_eq!(config.monitoring.server, "10.2.0.1");
        assert_eq!(config.monitoring.port, 10050);
        assert_eq!(config.base.timezone.as_deref(), Some("America/Sao_Paulo"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/provision.toml");
        let mut config = ProvisionConfig::default();
        config.hardening.extra_directives = vec!["AllowUsers supcip".into()];
        save(&path, &config).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.hardening.extra_directives, vec!["AllowUsers supcip"]);
    }

    #[test]
    fn test_empty_token_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("provision.toml");
        fs::write(&path, "[ssh]\nconfirm_token = \"\"\n").unwrap();
        assert!(load(&path).is_err());
    }
}
