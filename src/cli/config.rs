//! `vm-provision config`: show the effective configuration or write a default file.

use crate::cli::CliContext;
use crate::core::settings;
use crate::models::config::ProvisionConfig;
use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use log::info;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Write a configuration file with all defaults
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn run(ctx: &CliContext, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            if let Some(w) = &ctx.config_load_warning {
                eprintln!("warning: {} (showing defaults)", w);
            }
            println!("# {}", ctx.config_path.display());
            print!("{}", settings::render(&ctx.config)?);
            Ok(())
        }
        ConfigCommand::Init(args) => {
            if ctx.config_path.exists() && !args.force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    ctx.config_path.display()
                );
            }
            settings::save(&ctx.config_path, &ProvisionConfig::default())?;
            info!("wrote {}", ctx.config_path.display());
            Ok(())
        }
    }
}
