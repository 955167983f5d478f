//! Host path resolution under a configurable filesystem root.

use crate::constants;
use crate::util::path::rooted;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProvisionPaths {
    pub root: PathBuf,
    pub root_home: PathBuf,
    pub root_ssh_dir: PathBuf,
    pub home_base: PathBuf,
    pub sshd_config: PathBuf,
    pub sshd_config_dir: PathBuf,
    pub hardening_fragment: PathBuf,
    pub sudoers_dir: PathBuf,
    pub run_lock: PathBuf,
    pub journal: PathBuf,
}

impl ProvisionPaths {
    /// Resolve paths from the CLI/env root, defaulting to `/`.
    pub fn resolve(root_arg: Option<PathBuf>) -> Self {
        Self::from_root(root_arg.unwrap_or_else(|| PathBuf::from("/")))
    }

    /// Create paths for a root directory standing in for `/`.
    pub fn from_root(root: PathBuf) -> Self {
        let root_home = rooted(&root, constants::ROOT_HOME);
        let root_ssh_dir = root_home.join(".ssh");
        let sshd_config_dir = rooted(&root, constants::SSHD_CONFIG_DIR);
        let hardening_fragment = sshd_config_dir.join(constants::HARDENING_FRAGMENT);
        Self {
            home_base: rooted(&root, constants::HOME_BASE),
            sshd_config: rooted(&root, constants::SSHD_CONFIG),
            sudoers_dir: rooted(&root, constants::SUDOERS_DIR),
            run_lock: rooted(&root, constants::RUN_LOCK_PATH),
            journal: rooted(&root, constants::JOURNAL_PATH),
            root_home,
            root_ssh_dir,
            sshd_config_dir,
            hardening_fragment,
            root,
        }
    }

    /// Map an absolute host path (as written in config files) under the root.
    pub fn host(&self, host_path: impl AsRef<Path>) -> PathBuf {
        rooted(&self.root, host_path)
    }

    /// Inverse of [`ProvisionPaths::host`]: the path as the host sees it.
    pub fn to_host(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(relative) => Path::new("/").join(relative),
            Err(_) => path.to_path_buf(),
        }
    }

    /// Private key path derived from the host name.
    pub fn key_path(&self, hostname: &str) -> PathBuf {
        self.root_ssh_dir.join(hostname)
    }

    pub fn account_home(&self, account: &str) -> PathBuf {
        self.home_base.join(account)
    }

    pub fn sudoers_file(&self, account: &str) -> PathBuf {
        self.sudoers_dir.join(account)
    }

    /// Timestamped backup next to the base sshd configuration.
    pub fn sshd_backup(&self, at: &DateTime<Local>) -> PathBuf {
        let mut name = self.sshd_config.as_os_str().to_owned();
        name.push(format!(".bak.{}", at.format("%Y%m%d-%H%M%S")));
        PathBuf::from(name)
    }
}

impl std::fmt::Display for ProvisionPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host@{}", self.root.display())
    }
}
