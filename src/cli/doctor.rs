//! Read-only diagnostics of the host's SSH access configuration.

use crate::cli::CliContext;
use crate::constants;
use crate::core::account;
use crate::core::journal;
use crate::core::paths::ProvisionPaths;
use crate::core::sshd_config;
use crate::models::config::ProvisionConfig;
use crate::util::fs::mode_of;
use crate::util::host::{find_bins_on_path, Host, SystemHost};
use anyhow::{bail, Result};
use clap::Args;
use std::fs;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Also check for multiple vm-provision binaries on PATH
    #[arg(long)]
    pub path: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Default)]
pub struct Findings {
    pub items: Vec<(Level, String)>,
}

impl Findings {
    fn pass(&mut self, msg: impl Into<String>) {
        self.items.push((Level::Pass, msg.into()));
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.items.push((Level::Warn, msg.into()));
    }

    fn fail(&mut self, msg: impl Into<String>) {
        self.items.push((Level::Fail, msg.into()));
    }

    fn count(&self, level: Level) -> usize {
        self.items.iter().filter(|(l, _)| *l == level).count()
    }

    fn mode(&mut self, what: &str, path: &std::path::Path, expected: u32) {
        match mode_of(path) {
            Some(mode) if mode == expected => self.pass(format!("{} mode ok: {:04o}", what, mode)),
            Some(mode) => self.fail(format!(
                "{} mode: {:04o} (expected {:04o})",
                what, mode, expected
            )),
            None => self.warn(format!("{} missing: {}", what, path.display())),
        }
    }
}

pub fn run(ctx: &CliContext, args: DoctorArgs) -> Result<()> {
    println!("Doctor: {}", ctx.paths);
    if let Some(w) = &ctx.config_load_warning {
        println!("  [WARN] {}", w);
    }

    let mut findings = inspect(&SystemHost, &ctx.paths, &ctx.config);

    if args.path {
        let bins = find_bins_on_path("vm-provision");
        match bins.len() {
            0 => findings.warn("vm-provision not found on PATH"),
            1 => findings.pass(format!("vm-provision on PATH: {}", bins[0].display())),
            _ => findings.warn(format!(
                "multiple vm-provision binaries on PATH: {}",
                bins.iter()
                    .map(|b| b.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }

    for (level, msg) in &findings.items {
        let tag = match level {
            Level::Pass => "[PASS]",
            Level::Warn => "[WARN]",
            Level::Fail => "[FAIL]",
        };
        println!("  {} {}", tag, msg);
    }

    if let Ok(entries) = journal::read_entries(&ctx.paths.journal, Some(1)) {
        if let Some(last) = entries.last() {
            println!(
                "  [INFO] last journal entry: {} {} {:?} at {}",
                last.phase, last.actor, last.outcome, last.timestamp
            );
        }
    }

    let fail = findings.count(Level::Fail);
    println!();
    println!(
        "Doctor summary: {} pass, {} warn, {} fail",
        findings.count(Level::Pass),
        findings.count(Level::Warn),
        fail
    );
    if fail > 0 {
        bail!("{} check(s) failed", fail);
    }
    Ok(())
}

/// Run every check that does not depend on CLI flags.
pub fn inspect(host: &dyn Host, paths: &ProvisionPaths, config: &ProvisionConfig) -> Findings {
    let mut f = Findings::default();
    let hardened_expected = config.ssh.profile.hardens();

    if !paths.sshd_config.is_file() {
        f.fail(format!("sshd config missing: {}", paths.sshd_config.display()));
    } else {
        let content = fs::read_to_string(&paths.sshd_config).unwrap_or_default();
        if sshd_config::include_is_first(&content) {
            f.pass("base sshd config includes sshd_config.d first");
        } else if sshd_config::has_include(&content) {
            f.warn("Include for sshd_config.d is not the first directive; earlier base settings win");
        } else {
            f.warn("base sshd config has no Include for sshd_config.d");
        }

        for (key, hardened) in [
            ("PermitRootLogin", "no"),
            ("PasswordAuthentication", "no"),
            ("PubkeyAuthentication", "yes"),
        ] {
            match sshd_config::effective_value(&paths.root, &paths.sshd_config, key) {
                Ok(Some(value)) if value.eq_ignore_ascii_case(hardened) => {
                    f.pass(format!("{} {}", key, value))
                }
                Ok(value) => {
                    let shown = value.unwrap_or_else(|| "(sshd default)".to_string());
                    let msg = format!("{} {} (hardened: {})", key, shown, hardened);
                    if hardened_expected {
                        f.warn(msg)
                    } else {
                        f.pass(msg)
                    }
                }
                Err(e) => f.fail(format!("cannot resolve {}: {:#}", key, e)),
            }
        }
    }

    if paths.hardening_fragment.is_file() {
        f.mode("hardening fragment", &paths.hardening_fragment, constants::SSHD_FRAGMENT_MODE);
    } else if hardened_expected {
        f.warn(format!(
            "hardening fragment not written yet: {}",
            paths.hardening_fragment.display()
        ));
    }

    let account = &config.ssh.account;
    let home = account::home_of(host, paths, account).unwrap_or_else(|e| {
        f.warn(format!("cannot look up {}: {:#}", account, e));
        paths.account_home(account)
    });
    let authorized_keys = account::authorized_keys_in(&home);
    f.mode(&format!("{} .ssh directory", account), &home.join(".ssh"), constants::SSH_DIR_MODE);
    f.mode(&format!("{} authorized_keys", account), &authorized_keys, constants::SSH_FILE_MODE);
    f.mode(
        &format!("{} sudoers grant", account),
        &paths.sudoers_file(account),
        constants::SUDOERS_MODE,
    );

    match host.hostname() {
        Ok(name) => f.mode("host private key", &paths.key_path(name.trim()), constants::SSH_FILE_MODE),
        Err(e) => f.warn(format!("cannot read hostname: {:#}", e)),
    }

    for tool in ["sshd", "ssh-keygen", "useradd", "visudo", "systemctl"] {
        if host.has_command(tool) {
            f.pass(format!("{} available", tool));
        } else {
            f.fail(format!("{} not found on PATH", tool));
        }
    }
    if !host.has_command("firewall-cmd") && !host.has_command("ufw") {
        f.warn("no firewall front end (firewall-cmd or ufw) on PATH");
    }

    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeHost;
    use crate::util::fs::set_permissions;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, ProvisionPaths, FakeHost) {
        let dir = TempDir::new().unwrap();
        let paths = ProvisionPaths::from_root(dir.path().to_path_buf());
        let host = FakeHost::new(dir.path());
        for tool in ["sshd", "ssh-keygen", "useradd", "visudo", "systemctl", "ufw"] {
            host.add_command(tool);
        }
        (dir, paths, host)
    }

    fn messages(f: &Findings, level: Level) -> Vec<String> {
        f.items
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    #[test]
    fn test_hardened_host_passes() {
        let (_dir, paths, host) = fixture();
        fs::create_dir_all(&paths.sshd_config_dir).unwrap();
        fs::write(
            &paths.sshd_config,
            "Include /etc/ssh/sshd_config.d/*.conf\nPermitRootLogin yes\n",
        )
        .unwrap();
        fs::write(
            &paths.hardening_fragment,
            "PermitRootLogin no\nPasswordAuthentication no\nPubkeyAuthentication yes\n",
        )
        .unwrap();
        set_permissions(&paths.hardening_fragment, 0o644).unwrap();

        let keys = paths.account_home("supcip").join(".ssh/authorized_keys");
        fs::create_dir_all(keys.parent().unwrap()).unwrap();
        fs::write(&keys, "ssh-ed25519 AAAA\n").unwrap();
        set_permissions(keys.parent().unwrap(), 0o700).unwrap();
        set_permissions(&keys, 0o600).unwrap();
        let sudoers = paths.sudoers_file("supcip");
        fs::create_dir_all(&paths.sudoers_dir).unwrap();
        fs::write(&sudoers, "supcip ALL=(ALL) NOPASSWD:ALL\n").unwrap();
        set_permissions(&sudoers, 0o440).unwrap();
        fs::create_dir_all(&paths.root_ssh_dir).unwrap();
        fs::write(paths.key_path("web1"), "key").unwrap();
        set_permissions(&paths.key_path("web1"), 0o600).unwrap();

        let findings = inspect(&host, &paths, &ProvisionConfig::default());
        assert!(messages(&findings, Level::Fail).is_empty(), "{:?}", findings);
        assert!(messages(&findings, Level::Warn).is_empty(), "{:?}", findings);
    }

    #[test]
    fn test_permissive_host_and_loose_modes_are_flagged() {
        let (_dir, paths, host) = fixture();
        fs::create_dir_all(paths.sshd_config.parent().unwrap()).unwrap();
        fs::write(&paths.sshd_config, "PermitRootLogin yes\nPasswordAuthentication yes\n").unwrap();
        let keys = paths.account_home("supcip").join(".ssh/authorized_keys");
        fs::create_dir_all(keys.parent().unwrap()).unwrap();
        fs::write(&keys, "ssh-ed25519 AAAA\n").unwrap();
        set_permissions(&keys, 0o644).unwrap();

        let findings = inspect(&host, &paths, &ProvisionConfig::default());
        let warns = messages(&findings, Level::Warn).join("\n");
        assert!(warns.contains("PermitRootLogin yes"));
        assert!(warns.contains("PasswordAuthentication yes"));
        assert!(warns.contains("hardening fragment not written yet"));
        let fails = messages(&findings, Level::Fail).join("\n");
        assert!(fails.contains("authorized_keys mode: 0644"));
    }

    #[test]
    fn test_late_include_is_flagged() {
        let (_dir, paths, host) = fixture();
        fs::create_dir_all(&paths.sshd_config_dir).unwrap();
        fs::write(
            &paths.sshd_config,
            "PermitRootLogin yes\nInclude /etc/ssh/sshd_config.d/*.conf\n",
        )
        .unwrap();
        let findings = inspect(&host, &paths, &ProvisionConfig::default());
        let warns = messages(&findings, Level::Warn).join("\n");
        assert!(warns.contains("not the first directive"));
    }

    #[test]
    fn test_missing_tools_fail() {
        let dir = TempDir::new().unwrap();
        let paths = ProvisionPaths::from_root(dir.path().to_path_buf());
        let host = FakeHost::new(dir.path());
        let findings = inspect(&host, &paths, &ProvisionConfig::default());
        let fails = messages(&findings, Level::Fail).join("\n");
        assert!(fails.contains("sshd config missing"));
        assert!(fails.contains("visudo not found on PATH"));
    }
}
