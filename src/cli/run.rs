//! `vm-provision run`: the full provisioning workflow.

use crate::cli::CliContext;
use crate::core::file_lock::RunLock;
use crate::core::gate::ConsoleConfirmation;
use crate::core::journal::Journal;
use crate::core::paths::ProvisionPaths;
use crate::core::snapshot::HostSnapshot;
use crate::core::workflow::{RunReport, Workflow};
use crate::models::config::ProvisionConfig;
use crate::models::state::{AuthConfigState, Phase, SshProfile};
use crate::util::host::SystemHost;
use crate::util::privilege::Privileged;
use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use log::{debug, info};
use std::path::Path;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the SSH profile
    #[arg(long, value_enum)]
    pub profile: Option<SshProfile>,
    /// Override the service account name
    #[arg(long)]
    pub account: Option<String>,
    /// Override the monitoring server address
    #[arg(long, value_name = "ADDR")]
    pub monitoring_server: Option<String>,
    /// Skip the base phases (packages, locale, editor, shell, monitoring)
    #[arg(long)]
    pub skip_base: bool,
    /// Delay after each output line, in milliseconds
    #[arg(long, value_name = "MS")]
    pub pace_ms: Option<u64>,
}

impl RunArgs {
    pub fn apply(&self, config: &mut ProvisionConfig) {
        if let Some(profile) = self.profile {
            config.ssh.profile = profile;
        }
        if let Some(account) = &self.account {
            config.ssh.account = account.clone();
        }
        if let Some(server) = &self.monitoring_server {
            config.monitoring.server = server.clone();
        }
        if self.skip_base {
            config.base.enabled = false;
        }
        if let Some(pace) = self.pace_ms {
            config.output.pace_ms = pace;
        }
    }
}

pub fn run(ctx: &CliContext, _args: RunArgs) -> Result<()> {
    if let Some(w) = &ctx.config_load_warning {
        bail!("{}; refusing to provision with a configuration that did not load", w);
    }
    // Commands and the sshd Include always act on the real host.
    if ctx.paths.root != Path::new("/") {
        bail!(
            "run only works with --root / (got {}); use plan or doctor against a prefix",
            ctx.paths.root.display()
        );
    }
    let cap = Privileged::acquire("run")?;
    let lock = RunLock::acquire(&ctx.paths.run_lock)?;
    debug!("holding {}", lock.path().display());

    let host = SystemHost;
    let snapshot = HostSnapshot::capture(&host)?;
    info!(
        "provisioning {} ({}) with profile {}",
        snapshot.hostname, snapshot.address, ctx.config.ssh.profile
    );

    let journal = if ctx.config.output.journal {
        Journal::new(Some(ctx.paths.journal.clone()), ctx.config.output.journald)
    } else {
        Journal::new(None, ctx.config.output.journald)
    };

    let workflow = Workflow::new(&host, &ctx.paths, &ctx.config, &journal);
    let report = workflow.run(cap, &snapshot, &mut ConsoleConfirmation)?;

    info!(
        "done: {} phase(s) completed, auth state {}",
        report.completed.len(),
        report.state
    );
    println!("{}", next_steps(&ctx.paths, &ctx.config, &snapshot, &report));
    Ok(())
}

fn next_steps(
    paths: &ProvisionPaths,
    config: &ProvisionConfig,
    snapshot: &HostSnapshot,
    report: &RunReport,
) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Next step").add_attribute(Attribute::Bold),
        Cell::new("Details").add_attribute(Attribute::Bold),
    ]);

    match report.state {
        AuthConfigState::Hardened => {
            table.add_row(vec![
                Cell::new("Log in"),
                Cell::new(format!(
                    "ssh -i ~/.ssh/{} {}@{}",
                    snapshot.hostname, config.ssh.account, snapshot.address
                )),
            ]);
            table.add_row(vec![
                Cell::new("Root/password login"),
                Cell::new("disabled"),
            ]);
        }
        _ => {
            table.add_row(vec![
                Cell::new("Root/password login"),
                Cell::new("still ENABLED; run with --profile hardened once keys work"),
            ]);
        }
    }

    if let Some(key) = &report.key {
        table.add_row(vec![
            Cell::new("Private key"),
            Cell::new(paths.to_host(&key.private_key).display()),
        ]);
        if let Some(fp) = &key.fingerprint {
            table.add_row(vec![Cell::new("Fingerprint"), Cell::new(fp)]);
        }
    }
    if let Some(hardening) = &report.hardening {
        table.add_row(vec![
            Cell::new("sshd backup"),
            Cell::new(paths.to_host(&hardening.backup).display()),
        ]);
    }
    if let Some(monitoring) = &report.monitoring {
        table.add_row(vec![
            Cell::new("Monitoring"),
            Cell::new(format!(
                "{} reporting to {}",
                monitoring.service, config.monitoring.server
            )),
        ]);
    }
    if config.output.journal {
        table.add_row(vec![
            Cell::new("Journal"),
            Cell::new(paths.to_host(&paths.journal).display()),
        ]);
    }
    if report.completed.contains(&Phase::SystemUpdate) {
        table.add_row(vec![
            Cell::new("Reboot"),
            Cell::new("recommended after the package upgrade; confirm key login first"),
        ]);
    }
    table
}
