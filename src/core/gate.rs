//! Operator verification gate between granting key access and revoking
//! password/root access.
//!
//! The gate has no timeout and no bypass. It returns [`GatePassed`], which
//! the hardening commit requires, so hardening cannot be reached without an
//! exact confirmation.

use crate::core::keygen::KeyMaterial;
use crate::core::snapshot::HostSnapshot;
use crate::error::ProvisionError;
use anyhow::{Context, Result};
use dialoguer::Input;
use log::{info, warn};
use std::collections::VecDeque;

/// Source of operator input for the gate.
pub trait ConfirmationProvider {
    /// Block until the operator acknowledges `prompt`.
    fn acknowledge(&mut self, prompt: &str) -> Result<()>;

    /// Ask `prompt` and return the answer as typed.
    fn ask(&mut self, prompt: &str) -> Result<String>;
}

/// Reads answers from the terminal.
#[derive(Debug, Default)]
pub struct ConsoleConfirmation;

impl ConfirmationProvider for ConsoleConfirmation {
    fn acknowledge(&mut self, prompt: &str) -> Result<()> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .context("read acknowledgement")?;
        Ok(())
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .context("read confirmation")
    }
}

/// Replays canned answers; runs out with [`ProvisionError::GateAborted`].
#[derive(Debug, Default)]
pub struct ScriptedConfirmation {
    responses: VecDeque<String>,
    pub acknowledged: Vec<String>,
    pub asked: Vec<String>,
}

impl ScriptedConfirmation {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            acknowledged: Vec::new(),
            asked: Vec::new(),
        }
    }
}

impl ConfirmationProvider for ScriptedConfirmation {
    fn acknowledge(&mut self, prompt: &str) -> Result<()> {
        self.acknowledged.push(prompt.to_string());
        Ok(())
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.asked.push(prompt.to_string());
        self.responses.pop_front().ok_or_else(|| {
            ProvisionError::GateAborted {
                reason: "no scripted response left".to_string(),
            }
            .into()
        })
    }
}

/// Proof that the operator confirmed access through the gate.
#[derive(Debug)]
pub struct GatePassed {
    _private: (),
}

pub struct GateContext<'a> {
    pub account: &'a str,
    /// Private key path as seen on the host.
    pub remote_key_path: &'a str,
    pub token: &'a str,
    pub key: &'a KeyMaterial,
    pub snapshot: &'a HostSnapshot,
}

/// Only the exact token counts; case and whitespace variants do not.
pub fn is_affirmative(answer: &str, token: &str) -> bool {
    !token.is_empty() && answer == token
}

pub fn retrieval_instructions(ctx: &GateContext) -> Vec<String> {
    let mut lines = vec![
        "STEP 1: download the private key before anything else.".to_string(),
        format!("  remote path: {}", ctx.remote_key_path),
        format!(
            "  from your workstation: scp root@{}:{} ~/.ssh/{}",
            ctx.snapshot.address, ctx.remote_key_path, ctx.snapshot.hostname
        ),
        format!("  then: chmod 600 ~/.ssh/{}", ctx.snapshot.hostname),
    ];
    if let Some(fp) = &ctx.key.fingerprint {
        lines.push(format!("  fingerprint: {}", fp));
    }
    lines
}

pub fn access_test_instructions(ctx: &GateContext) -> Vec<String> {
    vec![
        "STEP 2: in a NEW terminal, keep this session open and test the new account:".to_string(),
        format!(
            "  ssh -i ~/.ssh/{} {}@{}",
            ctx.snapshot.hostname, ctx.account, ctx.snapshot.address
        ),
        "  sudo whoami    (must print: root, without a password prompt)".to_string(),
        "Root and password login are disabled after this step.".to_string(),
    ]
}

pub fn run(provider: &mut dyn ConfirmationProvider, ctx: &GateContext) -> Result<GatePassed> {
    for line in retrieval_instructions(ctx) {
        info!("{}", line);
    }
    provider.acknowledge("Press Enter once the private key is on your workstation")?;

    let question = format!(
        "Did you log in as {} and run sudo? Type {} to continue",
        ctx.account, ctx.token
    );
    for line in access_test_instructions(ctx) {
        info!("{}", line);
    }
    provider.acknowledge("Press Enter once the test login in the other terminal is done")?;

    loop {
        let answer = provider.ask(&question)?;
        if is_affirmative(&answer, ctx.token) {
            info!("access confirmed by operator");
            return Ok(GatePassed { _private: () });
        }
        warn!(
            "access NOT confirmed; hardening now would lock you out. Type exactly {} once the test succeeds.",
            ctx.token
        );
        for line in access_test_instructions(ctx) {
            info!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::path::PathBuf;

    fn key() -> KeyMaterial {
        KeyMaterial {
            private_key: PathBuf::from("/tmp/x/root/.ssh/web1"),
            public_key: PathBuf::from("/tmp/x/root/.ssh/web1.pub"),
            public_line: "ssh-ed25519 AAAA web1".to_string(),
            fingerprint: Some("SHA256:abc".to_string()),
            generated: true,
        }
    }

    fn snapshot() -> HostSnapshot {
        HostSnapshot {
            hostname: "web1".to_string(),
            address: "10.0.0.5".to_string(),
            started_at: Local::now(),
        }
    }

    #[test]
    fn test_rejects_everything_but_exact_token() {
        let key = key();
        let snap = snapshot();
        let ctx = GateContext {
            account: "supcip",
            remote_key_path: "/root/.ssh/web1",
            token: "CONFIRMED",
            key: &key,
            snapshot: &snap,
        };
        let inputs = ["sim", "SIM", "yes", "", "confirmed", " CONFIRMED", "CONFIRMED "];
        let mut provider = ScriptedConfirmation::new(inputs);
        let err = run(&mut provider, &ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::GateAborted { .. })
        ));
        // Every input was consumed and one more prompt found the script empty.
        assert_eq!(provider.asked.len(), inputs.len() + 1);
        assert_eq!(provider.acknowledged.len(), 2);
    }

    #[test]
    fn test_exact_token_ends_loop() {
        let key = key();
        let snap = snapshot();
        let ctx = GateContext {
            account: "supcip",
            remote_key_path: "/root/.ssh/web1",
            token: "CONFIRMED",
            key: &key,
            snapshot: &snap,
        };
        let mut provider = ScriptedConfirmation::new(["no", "sim", "CONFIRMED", "leftover"]);
        run(&mut provider, &ctx).unwrap();
        assert_eq!(provider.asked.len(), 3);
        assert_eq!(provider.acknowledged.len(), 2);
        assert!(provider.acknowledged[0].contains("private key"));
        assert!(provider.acknowledged[1].contains("test login"));
    }

    #[test]
    fn test_empty_token_never_matches() {
        assert!(!is_affirmative("", ""));
        assert!(is_affirmative("CONFIRMED", "CONFIRMED"));
    }

    #[test]
    fn test_instructions_use_host_paths() {
        let key = key();
        let snap = snapshot();
        let ctx = GateContext {
            account: "supcip",
            remote_key_path: "/root/.ssh/web1",
            token: "CONFIRMED",
            key: &key,
            snapshot: &snap,
        };
        let retrieval = retrieval_instructions(&ctx).join("\n");
        assert!(retrieval.contains("scp root@10.0.0.5:/root/.ssh/web1 ~/.ssh/web1"));
        assert!(retrieval.contains("SHA256:abc"));
        let test = access_test_instructions(&ctx).join("\n");
        assert!(test.contains("ssh -i ~/.ssh/web1 supcip@10.0.0.5"));
    }
}
