//! Centralized constants for permissions, paths, and defaults.

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/vm-provision/provision.toml";

/// Advisory lock held for the duration of a run.
pub const RUN_LOCK_PATH: &str = "/run/vm-provision.lock";

/// Append-only phase journal.
pub const JOURNAL_PATH: &str = "/var/log/vm-provision/journal.log";

/// Home directory of the super-user.
pub const ROOT_HOME: &str = "/root";

/// Parent of service account home directories.
pub const HOME_BASE: &str = "/home";

/// Base configuration of the SSH daemon.
pub const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";

/// Drop-in directory read through the base file's `Include`.
pub const SSHD_CONFIG_DIR: &str = "/etc/ssh/sshd_config.d";

/// File name of the hardening fragment. Sorts first so its values win.
pub const HARDENING_FRAGMENT: &str = "01-hardening.conf";

/// Directory for elevated-execution grants.
pub const SUDOERS_DIR: &str = "/etc/sudoers.d";

/// Permission mode for `.ssh` directories.
pub const SSH_DIR_MODE: u32 = 0o700;

/// Permission mode for `authorized_keys` and private keys.
pub const SSH_FILE_MODE: u32 = 0o600;

/// Permission mode for public keys.
pub const PUBLIC_KEY_MODE: u32 = 0o644;

/// Permission mode for sudoers fragments.
pub const SUDOERS_MODE: u32 = 0o440;

/// Permission mode for the hardening fragment.
pub const SSHD_FRAGMENT_MODE: u32 = 0o644;

/// Permission mode for the journal file.
pub const JOURNAL_MODE: u32 = 0o640;

/// Permission mode for plain dotfiles written into a home directory.
pub const DOTFILE_MODE: u32 = 0o644;

/// Default service account name.
pub const DEFAULT_ACCOUNT: &str = "supcip";

/// Default login shell for the service account.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Default systemd unit of the SSH daemon.
pub const DEFAULT_SSH_SERVICE: &str = "ssh";

/// Token the operator must type to pass the verification gate.
pub const DEFAULT_CONFIRM_TOKEN: &str = "CONFIRMED";

/// Marker line guarding the shell customization block.
pub const BASHRC_MARKER: &str = "# >>> vm-provision shell customization >>>";

/// Agent configuration files, keyed by package name.
pub const AGENT_CONFIGS: &[(&str, &str)] = &[
    ("zabbix-agent2", "/etc/zabbix/zabbix_agent2.conf"),
    ("zabbix-agent", "/etc/zabbix/zabbix_agentd.conf"),
];

/// Systemd units of the monitoring agent, keyed by package name.
pub const AGENT_SERVICES: &[(&str, &str)] = &[
    ("zabbix-agent2", "zabbix-agent2"),
    ("zabbix-agent", "zabbix-agent"),
];

/// Default monitoring agent port.
pub const DEFAULT_AGENT_PORT: u16 = 10050;

/// Default delay after each operator-facing log line, in milliseconds.
pub const DEFAULT_PACE_MS: u64 = 300;
