//! Data structures shared by the CLI and the workflow.

pub mod config;
pub mod policy;
pub mod state;
