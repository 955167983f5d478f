//! Run profile, workflow phases and the authentication state machine.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which SSH phases a run includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SshProfile {
    /// Bootstrap only: root and password login stay enabled.
    Password,
    /// Key pair and service account, without the gate or hardening.
    Keys,
    /// Everything, ending with key-only authentication.
    #[default]
    Hardened,
}

impl SshProfile {
    pub fn provisions_keys(self) -> bool {
        matches!(self, SshProfile::Keys | SshProfile::Hardened)
    }

    pub fn hardens(self) -> bool {
        self == SshProfile::Hardened
    }
}

impl fmt::Display for SshProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SshProfile::Password => "password",
            SshProfile::Keys => "keys",
            SshProfile::Hardened => "hardened",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    SystemUpdate,
    Packages,
    Locale,
    Editor,
    Shell,
    Monitoring,
    AccessBootstrap,
    KeyGeneration,
    AccountProvisioning,
    VerificationGate,
    HardeningCommit,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::SystemUpdate => "system-update",
            Phase::Packages => "packages",
            Phase::Locale => "locale",
            Phase::Editor => "editor",
            Phase::Shell => "shell",
            Phase::Monitoring => "monitoring",
            Phase::AccessBootstrap => "access-bootstrap",
            Phase::KeyGeneration => "key-generation",
            Phase::AccountProvisioning => "account-provisioning",
            Phase::VerificationGate => "verification-gate",
            Phase::HardeningCommit => "hardening-commit",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Phase::SystemUpdate => "refresh package index and upgrade",
            Phase::Packages => "install essential packages",
            Phase::Locale => "set timezone and locale",
            Phase::Editor => "write editor configuration",
            Phase::Shell => "add shell customization",
            Phase::Monitoring => "install monitoring agent and open its port",
            Phase::AccessBootstrap => "allow root and password login",
            Phase::KeyGeneration => "generate host ED25519 key pair",
            Phase::AccountProvisioning => "create service account, keys and sudo grant",
            Phase::VerificationGate => "wait for operator to confirm key login",
            Phase::HardeningCommit => "disable root and password login",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Authentication state of the SSH daemon as driven by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthConfigState {
    Permissive,
    HardeningInProgress,
    Hardened,
}

impl fmt::Display for AuthConfigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthConfigState::Permissive => "permissive",
            AuthConfigState::HardeningInProgress => "hardening-in-progress",
            AuthConfigState::Hardened => "hardened",
        };
        f.write_str(name)
    }
}
