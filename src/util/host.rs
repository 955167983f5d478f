//! Access to the machine being provisioned.
//!
//! Every external command, account lookup and ownership change goes through
//! [`Host`], so the workflow can run against a scripted host in tests.

use crate::error::ProvisionError;
use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr).trim().to_string()
    }
}

pub trait Host {
    /// Run a command to completion. `Err` only when it could not be started.
    fn execute(&self, cmd: &HostCommand) -> Result<CommandOutput>;

    fn user_exists(&self, name: &str) -> Result<bool>;

    /// Home directory recorded in the user database, as the host sees it.
    fn home_dir(&self, name: &str) -> Result<Option<PathBuf>>;

    /// Give `path` and everything below it to `user` (and its primary group).
    fn chown_recursive(&self, path: &Path, user: &str) -> Result<()>;

    /// Whether `name` resolves to an executable on PATH.
    fn has_command(&self, name: &str) -> bool;

    fn hostname(&self) -> Result<String>;

    fn sleep(&self, duration: Duration);
}

/// Run `cmd` and turn a non-zero exit into [`ProvisionError::CommandFailed`].
pub fn run(host: &dyn Host, cmd: &HostCommand) -> Result<CommandOutput> {
    let output = host
        .execute(cmd)
        .with_context(|| format!("run {}", cmd))?;
    if output.success {
        return Ok(output);
    }
    Err(ProvisionError::CommandFailed {
        command: cmd.to_string(),
        output: output.combined(),
    }
    .into())
}

pub fn systemctl(host: &dyn Host, args: &[&str]) -> Result<()> {
    run(host, &HostCommand::new("systemctl").args(args.iter().copied())).map(|_| ())
}

/// Non-failing `systemctl is-active --quiet <unit>`.
pub fn is_active(host: &dyn Host, unit: &str) -> bool {
    host.execute(
        &HostCommand::new("systemctl")
            .arg("is-active")
            .arg("--quiet")
            .arg(unit),
    )
    .map(|o| o.success)
    .unwrap_or(false)
}

/// The real machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
    fn execute(&self, cmd: &HostCommand) -> Result<CommandOutput> {
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        for (key, value) in &cmd.env {
            command.env(key, value);
        }
        let output = command.output().context("run command")?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn user_exists(&self, name: &str) -> Result<bool> {
        let user = nix::unistd::User::from_name(name)
            .with_context(|| format!("look up user {}", name))?;
        Ok(user.is_some())
    }

    fn home_dir(&self, name: &str) -> Result<Option<PathBuf>> {
        let user = nix::unistd::User::from_name(name)
            .with_context(|| format!("look up user {}", name))?;
        Ok(user.map(|u| u.dir))
    }

    fn chown_recursive(&self, path: &Path, user: &str) -> Result<()> {
        let Some(entry) = nix::unistd::User::from_name(user)
            .with_context(|| format!("look up user {}", user))?
        else {
            bail!("user {} does not exist", user);
        };
        chown_tree(path, entry.uid, entry.gid)
    }

    fn has_command(&self, name: &str) -> bool {
        !find_bins_on_path(name).is_empty()
    }

    fn hostname(&self) -> Result<String> {
        let name = nix::unistd::gethostname().context("read hostname")?;
        Ok(name.to_string_lossy().into_owned())
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

fn chown_tree(path: &Path, uid: nix::unistd::Uid, gid: nix::unistd::Gid) -> Result<()> {
    let meta =
        fs::symlink_metadata(path).with_context(|| format!("inspect {}", path.display()))?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    nix::unistd::chown(path, Some(uid), Some(gid))
        .with_context(|| format!("chown {}", path.display()))?;
    if meta.is_dir() {
        for entry in fs::read_dir(path).with_context(|| format!("read {}", path.display()))? {
            chown_tree(&entry?.path(), uid, gid)?;
        }
    }
    Ok(())
}

pub fn find_bins_on_path(name: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let path = env::var_os("PATH").unwrap_or_default();
    for dir in env::split_paths(&path) {
        let candidate = dir.join(name);
        if is_executable_file(&candidate) && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

fn is_executable_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            return (meta.permissions().mode() & 0o111) != 0;
        }
        false
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_empty_and_spaced_args() {
        let cmd = HostCommand::new("ssh-keygen")
            .args(["-N", "", "-C", "web 1"])
            .arg("-q");
        assert_eq!(cmd.to_string(), "ssh-keygen -N '' -C 'web 1' -q");
    }

    #[test]
    fn test_combined_output_trims() {
        let out = CommandOutput {
            success: false,
            stdout: "line\n".into(),
            stderr: "err\n".into(),
        };
        assert_eq!(out.combined(), "line\nerr");
    }

    #[test]
    fn test_system_host_runs_true() {
        let out = SystemHost.execute(&HostCommand::new("true")).unwrap();
        assert!(out.success);
    }

    #[test]
    fn test_run_reports_command_failure() {
        let err = run(&SystemHost, &HostCommand::new("false")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::CommandFailed { .. })
        ));
    }
}
