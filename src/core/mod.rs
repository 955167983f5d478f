//! Core provisioning logic.

pub mod account;
pub mod base;
pub mod bootstrap;
pub mod file_lock;
pub mod gate;
pub mod hardening;
pub mod journal;
pub mod keygen;
pub mod monitoring;
pub mod paths;
pub mod settings;
pub mod snapshot;
pub mod sshd_config;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
