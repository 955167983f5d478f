//! Utility modules for the filesystem, the host and operator output.

pub mod fs;
pub mod host;
pub mod journald;
pub mod logger;
pub mod path;
pub mod privilege;
