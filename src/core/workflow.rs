//! The provisioning workflow: base phases, then the SSH access sequence.
//!
//! Phases run in a fixed order and each one is gated on the success of the
//! previous one. Root and password login are only revoked after the
//! verification gate has produced a [`GatePassed`](crate::core::gate::GatePassed).

use crate::core::account::{self, AccountReport};
use crate::core::base;
use crate::core::bootstrap::{self, BootstrapReport};
use crate::core::gate::{self, ConfirmationProvider, GateContext};
use crate::core::hardening::{self, HardeningReport};
use crate::core::journal::{Journal, Outcome};
use crate::core::keygen::{self, KeyMaterial};
use crate::core::monitoring::{self, MonitoringReport};
use crate::core::paths::ProvisionPaths;
use crate::core::snapshot::HostSnapshot;
use crate::models::config::ProvisionConfig;
use crate::models::state::{AuthConfigState, Phase};
use crate::util::host::Host;
use crate::util::privilege::Privileged;
use anyhow::{anyhow, Result};
use log::{info, warn};

/// Phases a run with `config` executes, in order.
pub fn plan(config: &ProvisionConfig) -> Vec<Phase> {
    let mut phases = Vec::new();
    if config.base.enabled {
        phases.extend([
            Phase::SystemUpdate,
            Phase::Packages,
            Phase::Locale,
            Phase::Editor,
            Phase::Shell,
        ]);
        if config.monitoring.enabled {
            phases.push(Phase::Monitoring);
        }
    }
    phases.push(Phase::AccessBootstrap);
    let profile = config.ssh.profile;
    if profile.provisions_keys() {
        phases.extend([Phase::KeyGeneration, Phase::AccountProvisioning]);
    }
    if profile.hardens() {
        phases.extend([Phase::VerificationGate, Phase::HardeningCommit]);
    }
    phases
}

#[derive(Debug)]
pub struct RunReport {
    pub state: AuthConfigState,
    pub completed: Vec<Phase>,
    pub monitoring: Option<MonitoringReport>,
    pub bootstrap: Option<BootstrapReport>,
    pub key: Option<KeyMaterial>,
    pub account: Option<AccountReport>,
    pub hardening: Option<HardeningReport>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            state: AuthConfigState::Permissive,
            completed: Vec::new(),
            monitoring: None,
            bootstrap: None,
            key: None,
            account: None,
            hardening: None,
        }
    }
}

pub struct Workflow<'a> {
    host: &'a dyn Host,
    paths: &'a ProvisionPaths,
    config: &'a ProvisionConfig,
    journal: &'a Journal,
}

impl<'a> Workflow<'a> {
    pub fn new(
        host: &'a dyn Host,
        paths: &'a ProvisionPaths,
        config: &'a ProvisionConfig,
        journal: &'a Journal,
    ) -> Self {
        Self {
            host,
            paths,
            config,
            journal,
        }
    }

    pub fn run(
        &self,
        cap: Privileged,
        snapshot: &HostSnapshot,
        provider: &mut dyn ConfirmationProvider,
    ) -> Result<RunReport> {
        let phases = plan(self.config);
        let total = phases.len();
        let mut report = RunReport::new();
        let mut passed = None;

        for (idx, phase) in phases.into_iter().enumerate() {
            info!("[{}/{}] {}: {}", idx + 1, total, phase, phase.summary());
            self.journal
                .record(self.host, phase.name(), Outcome::Started, None);
            let result = match phase {
                Phase::VerificationGate => self.verification_gate(&report, snapshot, provider).map(|p| {
                    passed = Some(p);
                    report.state = AuthConfigState::HardeningInProgress;
                    info!("auth state: {}", report.state);
                    None
                }),
                Phase::HardeningCommit => match passed.take() {
                    Some(proof) => {
                        let cfg = self.config;
                        match hardening::commit(
                            cap,
                            self.host,
                            self.paths,
                            snapshot,
                            &cfg.hardening,
                            &cfg.ssh.service,
                            proof,
                        ) {
                            Ok(hardened) => {
                                report.state = AuthConfigState::Hardened;
                                info!("auth state: {}", report.state);
                                let detail = hardened.backup.display().to_string();
                                report.hardening = Some(hardened);
                                Ok(Some(detail))
                            }
                            Err(e) => {
                                report.state = AuthConfigState::Permissive;
                                warn!("auth state: {}", report.state);
                                Err(e)
                            }
                        }
                    }
                    None => Err(anyhow!("hardening requires a passed verification gate")),
                },
                _ => self.run_phase(cap, phase, snapshot, &mut report),
            };

            match result {
                Ok(detail) => {
                    self.journal.record(
                        self.host,
                        phase.name(),
                        Outcome::Completed,
                        detail.as_deref(),
                    );
                    report.completed.push(phase);
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    self.journal
                        .record(self.host, phase.name(), Outcome::Failed, Some(&message));
                    return Err(e.context(format!("phase {} failed", phase)));
                }
            }
        }
        Ok(report)
    }

    /// Run one of the phases that needs no cross-phase proof.
    /// Returns an optional journal detail.
    fn run_phase(
        &self,
        cap: Privileged,
        phase: Phase,
        snapshot: &HostSnapshot,
        report: &mut RunReport,
    ) -> Result<Option<String>> {
        let cfg = self.config;
        match phase {
            Phase::SystemUpdate => base::system_update(cap, self.host).map(|_| None),
            Phase::Packages => base::install_packages(cap, self.host, &cfg.base.packages).map(|_| None),
            Phase::Locale => base::set_locale(cap, self.host, &cfg.base).map(|_| None),
            Phase::Editor => base::write_editor_config(cap, self.paths, &cfg.base.vimrc)
                .map(|changed| (!changed).then(|| "unchanged".to_string())),
            Phase::Shell => base::add_shell_customization(cap, self.paths, &cfg.base.bashrc_block)
                .map(|added| (!added).then(|| "already present".to_string())),
            Phase::Monitoring => {
                let m = monitoring::setup(cap, self.host, self.paths, snapshot, &cfg.monitoring)?;
                let detail = format!("{} -> {}", m.package, cfg.monitoring.server);
                report.monitoring = Some(m);
                Ok(Some(detail))
            }
            Phase::AccessBootstrap => {
                let b = bootstrap::open_access(cap, self.host, self.paths, &cfg.ssh.service)?;
                let detail = format!("{} file(s) changed", b.changed.len());
                report.bootstrap = Some(b);
                Ok(Some(detail))
            }
            Phase::KeyGeneration => {
                let key = keygen::ensure_key_pair(cap, self.host, self.paths, snapshot)?;
                let detail = key.fingerprint.clone();
                report.key = Some(key);
                Ok(detail)
            }
            Phase::AccountProvisioning => {
                let key = report
                    .key
                    .as_ref()
                    .ok_or_else(|| anyhow!("account provisioning requires key material"))?;
                let acct = account::provision(cap, self.host, self.paths, &cfg.ssh, key)?;
                let detail = acct.account.clone();
                report.account = Some(acct);
                Ok(Some(detail))
            }
            Phase::VerificationGate | Phase::HardeningCommit => {
                Err(anyhow!("{} cannot run standalone", phase))
            }
        }
    }

    fn verification_gate(
        &self,
        report: &RunReport,
        snapshot: &HostSnapshot,
        provider: &mut dyn ConfirmationProvider,
    ) -> Result<gate::GatePassed> {
        let key = report
            .key
            .as_ref()
            .ok_or_else(|| anyhow!("verification gate requires key material"))?;
        let remote_key_path = self.paths.to_host(&key.private_key);
        let remote_key_path = remote_key_path.to_string_lossy();
        let ctx = GateContext {
            account: &self.config.ssh.account,
            remote_key_path: &remote_key_path,
            token: &self.config.ssh.confirm_token,
            key,
            snapshot,
        };
        gate::run(provider, &ctx)
    }
}
