//! Read-only preview of the phases a run would execute.

use crate::cli::CliContext;
use crate::core::workflow;
use crate::models::config::ProvisionConfig;
use crate::models::state::{Phase, SshProfile};
use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Override the SSH profile
    #[arg(long, value_enum)]
    pub profile: Option<SshProfile>,
    /// Leave out the base phases
    #[arg(long)]
    pub skip_base: bool,
    /// Output format (text|json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

impl PlanArgs {
    pub fn apply(&self, config: &mut ProvisionConfig) {
        if let Some(profile) = self.profile {
            config.ssh.profile = profile;
        }
        if self.skip_base {
            config.base.enabled = false;
        }
    }
}

fn touches_access(phase: Phase) -> bool {
    matches!(phase, Phase::AccessBootstrap | Phase::HardeningCommit)
}

pub fn run(ctx: &CliContext, args: PlanArgs) -> Result<()> {
    let config = &ctx.config;
    let phases = workflow::plan(config);

    match args.format.as_str() {
        "json" => {
            let names: Vec<&str> = phases.iter().map(|p| p.name()).collect();
            let plan = serde_json::json!({
                "profile": config.ssh.profile.to_string(),
                "account": config.ssh.account,
                "phases": names,
                "config": ctx.config_path.display().to_string(),
                "config_warning": ctx.config_load_warning,
            });
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        "text" => {
            if let Some(w) = &ctx.config_load_warning {
                println!("warning: {} (showing defaults)", w);
            }
            println!(
                "Plan: profile {} for account {} on {}",
                config.ssh.profile, config.ssh.account, ctx.paths
            );
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                Cell::new("#").add_attribute(Attribute::Bold),
                Cell::new("Phase").add_attribute(Attribute::Bold),
                Cell::new("Action").add_attribute(Attribute::Bold),
            ]);
            for (idx, phase) in phases.iter().enumerate() {
                let name = if touches_access(*phase) {
                    Cell::new(phase.name()).fg(Color::Yellow)
                } else {
                    Cell::new(phase.name())
                };
                table.add_row(vec![
                    Cell::new(idx + 1),
                    name,
                    Cell::new(phase.summary()),
                ]);
            }
            println!("{table}");
            if config.ssh.profile.hardens() {
                println!(
                    "Hardening waits for the operator to type {} after testing key login.",
                    config.ssh.confirm_token
                );
            }
            println!("\nNo changes made (dry-run).");
        }
        other => bail!("unknown format '{}' (expected text or json)", other),
    }
    Ok(())
}
