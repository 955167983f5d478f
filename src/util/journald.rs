//! Optional journald forwarding via systemd-cat.
//!
//! Best-effort: failure to forward must not break a provisioning run.

use crate::util::host::{Host, HostCommand};

pub const TAG: &str = "vm-provision";

/// Forward a single line to journald as `systemd-cat -t <tag> -p <priority> echo <line>`.
pub fn forward_line(host: &dyn Host, priority: &str, line: &str) {
    if !host.has_command("systemd-cat") {
        return;
    }
    let cmd = HostCommand::new("systemd-cat")
        .args(["-t", TAG, "-p", priority, "echo"])
        .arg(line);
    let _ = host.execute(&cmd);
}
