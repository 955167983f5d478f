//! Hardening policy for the SSH daemon.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardeningPolicy {
    /// Seconds between liveness probes sent to an idle client.
    #[serde(default = "default_client_alive_interval")]
    pub client_alive_interval: u32,

    /// Missed probes before the session is dropped.
    #[serde(default = "default_client_alive_count_max")]
    pub client_alive_count_max: u32,

    #[serde(default = "default_max_auth_tries")]
    pub max_auth_tries: u32,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,

    /// Raw `Keyword value` lines appended to the fragment.
    #[serde(default)]
    pub extra_directives: Vec<String>,

    /// Restart liveness probes before the daemon is declared down.
    #[serde(default = "default_liveness_attempts")]
    pub liveness_attempts: u32,

    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,
}

impl Default for HardeningPolicy {
    fn default() -> Self {
        Self {
            client_alive_interval: default_client_alive_interval(),
            client_alive_count_max: default_client_alive_count_max(),
            max_auth_tries: default_max_auth_tries(),
            max_sessions: default_max_sessions(),
            extra_directives: Vec::new(),
            liveness_attempts: default_liveness_attempts(),
            liveness_interval_ms: default_liveness_interval_ms(),
        }
    }
}

impl HardeningPolicy {
    /// Fixed directive set followed by the configured extras, in file order.
    pub fn directives(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = [
            ("PermitRootLogin", "no".to_string()),
            ("PubkeyAuthentication", "yes".to_string()),
            ("PasswordAuthentication", "no".to_string()),
            ("PermitEmptyPasswords", "no".to_string()),
            ("KbdInteractiveAuthentication", "no".to_string()),
            ("ChallengeResponseAuthentication", "no".to_string()),
            ("X11Forwarding", "no".to_string()),
            ("PrintMotd", "no".to_string()),
            ("ClientAliveInterval", self.client_alive_interval.to_string()),
            ("ClientAliveCountMax", self.client_alive_count_max.to_string()),
            ("MaxAuthTries", self.max_auth_tries.to_string()),
            ("MaxSessions", self.max_sessions.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        for line in &self.extra_directives {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            out.push((key.to_string(), value.trim().to_string()));
        }
        out
    }
}

fn default_client_alive_interval() -> u32 {
    300
}

fn default_client_alive_count_max() -> u32 {
    2
}

fn default_max_auth_tries() -> u32 {
    3
}

fn default_max_sessions() -> u32 {
    2
}

fn default_liveness_attempts() -> u32 {
    5
}

fn default_liveness_interval_ms() -> u64 {
    1000
}
