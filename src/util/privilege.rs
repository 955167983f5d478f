//! Privilege checks and the capability handed to mutating phases.

use crate::error::ProvisionError;
use anyhow::Result;

/// Check if the current process is running as root (euid 0).
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Require root for a given action, or bail with an error.
pub fn require_root(action: &str) -> Result<()> {
    if !is_root() {
        return Err(ProvisionError::NotRoot {
            action: action.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Proof that the process may write protected paths, control services and
/// manage accounts.
///
/// Only [`Privileged::acquire`] hands one out in production, so a phase that
/// takes `Privileged` cannot be reached without the root check.
#[derive(Debug, Clone, Copy)]
pub struct Privileged {
    _private: (),
}

impl Privileged {
    pub fn acquire(action: &str) -> Result<Self> {
        require_root(action)?;
        Ok(Self { _private: () })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self { _private: () }
    }
}
