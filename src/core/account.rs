//! Service account provisioning: identity, authorized keys, sudo grant, dotfiles.

use crate::constants;
use crate::core::keygen::KeyMaterial;
use crate::core::paths::ProvisionPaths;
use crate::models::config::SshSection;
use crate::util::fs as host_fs;
use crate::util::host::{self, Host, HostCommand};
use crate::util::privilege::Privileged;
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AccountReport {
    pub account: String,
    pub created: bool,
    pub home: PathBuf,
    pub authorized_keys: PathBuf,
    pub sudoers: PathBuf,
    pub sudoers_written: bool,
    pub dotfiles: Vec<PathBuf>,
}

pub fn provision(
    cap: Privileged,
    host: &dyn Host,
    paths: &ProvisionPaths,
    ssh: &SshSection,
    key: &KeyMaterial,
) -> Result<AccountReport> {
    let account = ssh.account.as_str();
    validate_account_name(account)?;

    let created = ensure_account(cap, host, account, &ssh.shell)?;
    let home = home_of(host, paths, account)?;
    let authorized_keys = install_authorized_key(cap, host, &home, account, &key.public_line)?;
    let sudoers = paths.sudoers_file(account);
    let sudoers_written = grant_sudo(cap, host, &sudoers, account)?;
    let dotfiles = copy_dotfiles(cap, host, paths, &home, account, &ssh.dotfiles)?;

    Ok(AccountReport {
        account: account.to_string(),
        created,
        home,
        authorized_keys,
        sudoers,
        sudoers_written,
        dotfiles,
    })
}

fn validate_account_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 32
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid {
        bail!("invalid account name '{}'", name);
    }
    Ok(())
}

/// Create the account unless it exists. Returns whether it was created.
pub fn ensure_account(_cap: Privileged, host: &dyn Host, account: &str, shell: &str) -> Result<bool> {
    if host.user_exists(account)? {
        warn!("account {} already exists; skipping creation", account);
        return Ok(false);
    }
    info!("creating account {}", account);
    host::run(
        host,
        &HostCommand::new("useradd").args(["-m", "-s", shell, account]),
    )
    .with_context(|| format!("create account {}", account))?;
    Ok(true)
}

/// Home of `account` under the provisioning root.
///
/// Taken from the user database; an unknown account falls back to the
/// default `<home base>/<name>`.
pub fn home_of(host: &dyn Host, paths: &ProvisionPaths, account: &str) -> Result<PathBuf> {
    match host.home_dir(account)? {
        Some(dir) => Ok(paths.host(dir)),
        None => Ok(paths.account_home(account)),
    }
}

pub fn authorized_keys_in(home: &Path) -> PathBuf {
    home.join(".ssh").join("authorized_keys")
}

/// Append `public_line` to the account's authorized keys.
///
/// Modes are set explicitly after every write so the result is 0700/0600
/// whatever the umask.
pub fn install_authorized_key(
    _cap: Privileged,
    host: &dyn Host,
    home: &Path,
    account: &str,
    public_line: &str,
) -> Result<PathBuf> {
    let ssh_dir = home.join(".ssh");
    let authorized_keys = authorized_keys_in(home);

    host_fs::ensure_dir(&ssh_dir, constants::SSH_DIR_MODE)?;
    host_fs::append_line(&authorized_keys, public_line)?;
    host_fs::set_permissions(&authorized_keys, constants::SSH_FILE_MODE)?;
    host_fs::set_permissions(&ssh_dir, constants::SSH_DIR_MODE)?;
    host.chown_recursive(&ssh_dir, account)?;
    info!("installed public key into {}", authorized_keys.display());
    Ok(authorized_keys)
}

/// Write the passwordless sudo grant unless one exists. Returns whether it was written.
pub fn grant_sudo(_cap: Privileged, host: &dyn Host, sudoers: &Path, account: &str) -> Result<bool> {
    if sudoers.exists() {
        warn!("{} already exists; leaving it unchanged", sudoers.display());
        return Ok(false);
    }
    let content = format!("{} ALL=(ALL) NOPASSWD:ALL\n", account);
    host_fs::write_atomic(sudoers, &content, constants::SUDOERS_MODE)?;

    let check = HostCommand::new("visudo")
        .arg("-cf")
        .arg(sudoers.to_string_lossy());
    if let Err(e) = host::run(host, &check) {
        fs::remove_file(sudoers).ok();
        return Err(e).context("sudoers fragment rejected by visudo; removed it");
    }
    info!("granted passwordless sudo to {}", account);
    Ok(true)
}

/// Copy the super-user's dotfiles into the account's home and hand them over.
pub fn copy_dotfiles(
    _cap: Privileged,
    host: &dyn Host,
    paths: &ProvisionPaths,
    home: &Path,
    account: &str,
    patterns: &[String],
) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    for pattern in patterns {
        let full = paths.root_home.join(pattern);
        let matches = glob::glob(&full.to_string_lossy())
            .with_context(|| format!("bad dotfile pattern {}", pattern))?;
        for source in matches.filter_map(|m| m.ok()) {
            let Ok(relative) = source.strip_prefix(&paths.root_home) else {
                continue;
            };
            let target = home.join(relative);
            host_fs::copy_tree(&source, &target)?;
            host.chown_recursive(&target, account)?;
            debug!("copied {} to {}", source.display(), target.display());
            copied.push(target);
        }
    }
    if !copied.is_empty() {
        info!("copied {} dotfile(s) to {}", copied.len(), home.display());
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{fake_public_line, FakeHost};
    use crate::util::fs::mode_of;
    use tempfile::TempDir;

    fn key(line: &str) -> KeyMaterial {
        KeyMaterial {
            private_key: PathBuf::from("/root/.ssh/web1"),
            public_key: PathBuf::from("/root/.ssh/web1.pub"),
            public_line: line.to_string(),
            fingerprint: None,
            generated: true,
        }
    }

    fn setup() -> (TempDir, ProvisionPaths, FakeHost) {
        let dir = TempDir::new().unwrap();
        let paths = ProvisionPaths::from_root(dir.path().to_path_buf());
        let host = FakeHost::new(dir.path());
        (dir, paths, host)
    }

    #[test]
    fn test_provision_fresh_account() {
        let (_dir, paths, host) = setup();
        fs::create_dir_all(paths.root_home.join(".vim/colors")).unwrap();
        fs::write(paths.root_home.join(".bashrc"), "alias ll='ls -l'\n").unwrap();
        fs::write(paths.root_home.join(".vim/colors/dark.vim"), "hi").unwrap();

        let line = fake_public_line("web1-2026-01-01");
        let report = provision(
            Privileged::for_tests(),
            &host,
            &paths,
            &SshSection::default(),
            &key(&line),
        )
        .unwrap();

        assert!(report.created);
        assert!(host.has_user("supcip"));
        assert!(host.ran("useradd -m -s /bin/bash supcip"));
        assert_eq!(
            fs::read_to_string(&report.authorized_keys).unwrap(),
            format!("{}\n", line)
        );
        assert!(report.sudoers_written);
        assert_eq!(
            fs::read_to_string(&report.sudoers).unwrap(),
            "supcip ALL=(ALL) NOPASSWD:ALL\n"
        );
        assert_eq!(mode_of(&report.sudoers), Some(0o440));
        assert_eq!(report.dotfiles.len(), 2);
        assert!(paths.account_home("supcip").join(".vim/colors/dark.vim").is_file());
        assert!(host
            .chowned
            .borrow()
            .iter()
            .all(|(_, user)| user == "supcip"));
    }

    #[test]
    fn test_existing_account_is_not_recreated() {
        let (_dir, _paths, host) = setup();
        host.add_user("supcip");
        let created = ensure_account(Privileged::for_tests(), &host, "supcip", "/bin/bash").unwrap();
        assert!(!created);
        assert!(!host.ran("useradd"));
    }

    #[test]
    fn test_existing_account_keeps_its_recorded_home() {
        let (_dir, paths, host) = setup();
        host.add_user_with_home("svc", "/srv/svc");
        fs::create_dir_all(&paths.root_home).unwrap();
        fs::write(paths.root_home.join(".bashrc"), "set -o vi\n").unwrap();
        let ssh = SshSection {
            account: "svc".into(),
            ..Default::default()
        };
        let report =
            provision(Privileged::for_tests(), &host, &paths, &ssh, &key("ssh-ed25519 AAAA a"))
                .unwrap();

        assert!(!report.created);
        assert_eq!(report.home, paths.host("/srv/svc"));
        assert_eq!(
            report.authorized_keys,
            paths.host("/srv/svc/.ssh/authorized_keys")
        );
        assert!(report.authorized_keys.is_file());
        assert!(paths.host("/srv/svc/.bashrc").is_file());
        assert!(!paths.account_home("svc").exists());
    }

    #[test]
    fn test_unknown_account_home_falls_back_to_home_base() {
        let (_dir, paths, host) = setup();
        assert_eq!(home_of(&host, &paths, "ghost").unwrap(), paths.account_home("ghost"));
    }

    #[test]
    fn test_authorized_keys_modes_ignore_permissive_start() {
        let (_dir, paths, host) = setup();
        let ssh_dir = paths.account_home("supcip").join(".ssh");
        fs::create_dir_all(&ssh_dir).unwrap();
        host_fs::set_permissions(&ssh_dir, 0o777).unwrap();
        fs::write(ssh_dir.join("authorized_keys"), "").unwrap();
        host_fs::set_permissions(&ssh_dir.join("authorized_keys"), 0o666).unwrap();

        let home = paths.account_home("supcip");
        let path =
            install_authorized_key(Privileged::for_tests(), &host, &home, "supcip", "ssh-ed25519 AAAA a")
                .unwrap();
        assert_eq!(mode_of(&ssh_dir), Some(0o700));
        assert_eq!(mode_of(&path), Some(0o600));
    }

    #[test]
    fn test_authorized_keys_append_does_not_dedupe() {
        let (_dir, paths, host) = setup();
        let home = paths.account_home("supcip");
        for _ in 0..2 {
            install_authorized_key(Privileged::for_tests(), &host, &home, "supcip", "ssh-ed25519 AAAA a")
                .unwrap();
        }
        let content = fs::read_to_string(authorized_keys_in(&home)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_existing_sudoers_is_kept() {
        let (_dir, paths, host) = setup();
        let sudoers = paths.sudoers_file("supcip");
        fs::create_dir_all(sudoers.parent().unwrap()).unwrap();
        fs::write(&sudoers, "custom\n").unwrap();
        let written = grant_sudo(Privileged::for_tests(), &host, &sudoers, "supcip").unwrap();
        assert!(!written);
        assert_eq!(fs::read_to_string(&sudoers).unwrap(), "custom\n");
    }

    #[test]
    fn test_rejected_sudoers_is_removed() {
        let (_dir, paths, host) = setup();
        host.fail_on("visudo", "syntax error");
        let sudoers = paths.sudoers_file("supcip");
        assert!(grant_sudo(Privileged::for_tests(), &host, &sudoers, "supcip").is_err());
        assert!(!sudoers.exists());
    }

    #[test]
    fn test_account_name_validation() {
        assert!(validate_account_name("supcip").is_ok());
        assert!(validate_account_name("ops_2").is_ok());
        assert!(validate_account_name("Root").is_err());
        assert!(validate_account_name("../etc").is_err());
        assert!(validate_account_name("").is_err());
    }
}
