//! Base system phases: packages, locale, editor and shell.

use crate::constants;
use crate::core::paths::ProvisionPaths;
use crate::models::config::BaseSection;
use crate::util::fs as host_fs;
use crate::util::host::{self, Host, HostCommand};
use crate::util::privilege::Privileged;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;

fn apt_get(args: &[&str]) -> HostCommand {
    HostCommand::new("apt-get")
        .args(args.iter().copied())
        .env("DEBIAN_FRONTEND", "noninteractive")
}

pub fn system_update(_cap: Privileged, host: &dyn Host) -> Result<()> {
    info!("refreshing package index");
    host::run(host, &apt_get(&["update"])).context("package index update")?;
    info!("upgrading installed packages");
    host::run(host, &apt_get(&["-y", "upgrade"])).context("package upgrade")?;
    Ok(())
}

pub fn install_packages(_cap: Privileged, host: &dyn Host, packages: &[String]) -> Result<()> {
    if packages.is_empty() {
        debug!("no packages configured");
        return Ok(());
    }
    info!("installing {}", packages.join(", "));
    let cmd = apt_get(&["install", "-y"]).args(packages.iter().cloned());
    host::run(host, &cmd).context("install essential packages")?;
    Ok(())
}

pub fn set_locale(_cap: Privileged, host: &dyn Host, base: &BaseSection) -> Result<()> {
    if let Some(tz) = &base.timezone {
        info!("setting timezone to {}", tz);
        host::run(host, &HostCommand::new("timedatectl").arg("set-timezone").arg(tz))?;
    }
    if let Some(locale) = &base.locale {
        info!("generating locale {}", locale);
        host::run(host, &HostCommand::new("locale-gen").arg(locale))?;
        host::run(
            host,
            &HostCommand::new("update-locale").arg(format!("LANG={}", locale)),
        )?;
    }
    Ok(())
}

/// Write the super-user's vimrc. Returns whether the file changed.
pub fn write_editor_config(_cap: Privileged, paths: &ProvisionPaths, vimrc: &str) -> Result<bool> {
    let target = paths.root_home.join(".vimrc");
    if fs::read_to_string(&target).ok().as_deref() == Some(vimrc) {
        debug!("{} already up to date", target.display());
        return Ok(false);
    }
    host_fs::write_atomic(&target, vimrc, constants::DOTFILE_MODE)?;
    info!("wrote {}", target.display());
    Ok(true)
}

/// Append the marked customization block to the super-user's bashrc once.
pub fn add_shell_customization(_cap: Privileged, paths: &ProvisionPaths, block: &str) -> Result<bool> {
    let target = paths.root_home.join(".bashrc");
    let current = fs::read_to_string(&target).unwrap_or_default();
    if current.lines().any(|l| l.trim_end() == constants::BASHRC_MARKER) {
        debug!("shell customization already present in {}", target.display());
        return Ok(false);
    }
    let mut updated = current;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(constants::BASHRC_MARKER);
    updated.push('\n');
    updated.push_str(block.trim_end());
    updated.push('\n');
    let mode = host_fs::mode_of(&target).unwrap_or(constants::DOTFILE_MODE);
    host_fs::write_atomic(&target, &updated, mode)?;
    info!("added shell customization to {}", target.display());
    Ok(true)
}
