//! Typed fatal conditions of a provisioning run.
//!
//! Most code propagates `anyhow::Error`; these variants are the failures that
//! callers (and tests) need to tell apart. They travel inside `anyhow::Error`
//! and can be recovered with `downcast_ref`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("'{action}' requires root privileges. Run with sudo.")]
    NotRoot { action: String },

    #[error("another provisioning run holds {lock}")]
    Locked { lock: String },

    #[error("`{command}` failed: {output}")]
    CommandFailed { command: String, output: String },

    #[error("sshd rejected the hardened configuration (changes rolled back): {output}")]
    ValidationFailed { output: String },

    #[error("{key} would still be '{value}' after hardening (changes rolled back); check {source_file}")]
    NotEnforced {
        key: String,
        value: String,
        source_file: String,
    },

    #[error("{service} is not active after restart; keep this session open and use the console")]
    DaemonNotLive { service: String },

    #[error("verification gate aborted: {reason}")]
    GateAborted { reason: String },
}
