//! VM provisioning with a lockout-safe SSH hardening sequence.
//!
//! Runs the base setup of a fresh Debian/Ubuntu VM, then moves SSH access
//! from root/password login to a key-only service account. Root and password
//! login are revoked only after an operator confirms the new path works.
//!
//! ## Modules
//! - `cli`: Command-line handlers
//! - `core`: Workflow phases (bootstrap, keygen, account, gate, hardening)
//! - `models`: Configuration and state types
//! - `util`: Host access, filesystem and logging helpers

pub mod cli;
pub mod constants;
pub mod core;
pub mod error;
pub mod models;
pub mod util;
