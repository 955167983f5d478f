//! CLI routing and command dispatch.

use crate::constants;
use crate::core::paths::ProvisionPaths;
use crate::core::settings;
use crate::models::config::ProvisionConfig;
use crate::util::{logger, privilege};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub mod config;
pub mod doctor;
pub mod plan;
pub mod run;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub paths: ProvisionPaths,
    pub config_path: PathBuf,
    pub config: ProvisionConfig,
    pub config_load_warning: Option<String>,
}

#[derive(Parser, Debug)]
#[command(
    name = "vm-provision",
    version,
    about = "Provision a fresh VM and harden its SSH access without locking the operator out"
)]
pub struct Cli {
    /// Filesystem root standing in for `/` (plan, doctor and config only)
    #[arg(long, global = true, value_name = "PATH", env = "VM_PROVISION_ROOT")]
    pub root: Option<PathBuf>,

    /// Configuration file (default: /etc/vm-provision/provision.toml under the root)
    #[arg(long, global = true, value_name = "PATH", env = "VM_PROVISION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let paths = ProvisionPaths::resolve(self.root);
        let config_path = self
            .config
            .unwrap_or_else(|| paths.host(constants::DEFAULT_CONFIG_PATH));

        // Best-effort so read-only commands still work; `run` refuses a broken file.
        let mut config_load_warning: Option<String> = None;
        let mut config = match settings::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                config_load_warning = Some(format!(
                    "cannot load {}: {:#}",
                    config_path.display(),
                    e
                ));
                ProvisionConfig::default()
            }
        };

        let pace = match &self.command {
            Commands::Run(args) => {
                args.apply(&mut config);
                Duration::from_millis(config.output.pace_ms)
            }
            Commands::Plan(args) => {
                args.apply(&mut config);
                Duration::ZERO
            }
            _ => Duration::ZERO,
        };
        logger::init(pace, self.verbose)?;

        let ctx = CliContext {
            paths,
            config_path,
            config,
            config_load_warning,
        };

        if self.command.requires_root() {
            privilege::require_root(self.command.name())?;
        }

        match self.command {
            Commands::Run(args) => run::run(&ctx, args),
            Commands::Plan(args) => plan::run(&ctx, args),
            Commands::Doctor(args) => doctor::run(&ctx, args),
            Commands::Config { command } => config::run(&ctx, command),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the provisioning workflow (requires root)
    Run(run::RunArgs),
    /// Preview the phases a run would execute (read-only)
    Plan(plan::PlanArgs),
    /// Inspect the host's SSH access configuration (safe, read-only)
    Doctor(doctor::DoctorArgs),
    /// Show or write the configuration file
    Config {
        #[command(subcommand)]
        command: config::ConfigCommand,
    },
}

impl Commands {
    /// Whether this command requires root privileges.
    pub fn requires_root(&self) -> bool {
        matches!(
            self,
            Commands::Run(_)
                | Commands::Config {
                    command: config::ConfigCommand::Init(_)
                }
        )
    }

    /// Command name for error messages.
    pub fn name(&self) -> &str {
        match self {
            Commands::Run(_) => "run",
            Commands::Plan(_) => "plan",
            Commands::Doctor(_) => "doctor",
            Commands::Config { .. } => "config",
        }
    }
}
