//! Provisioning configuration file model.

use crate::constants;
use crate::models::policy::HardeningPolicy;
use crate::models::state::SshProfile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionConfig {
    #[serde(default)]
    pub ssh: SshSection,
    #[serde(default)]
    pub hardening: HardeningPolicy,
    #[serde(default)]
    pub base: BaseSection,
    #[serde(default)]
    pub monitoring: MonitoringSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSection {
    #[serde(default)]
    pub profile: SshProfile,
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_confirm_token")]
    pub confirm_token: String,
    /// Glob patterns, relative to the super-user's home, copied to the account.
    #[serde(default = "default_dotfiles")]
    pub dotfiles: Vec<String>,
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            profile: SshProfile::default(),
            account: default_account(),
            shell: default_shell(),
            service: default_service(),
            confirm_token: default_confirm_token(),
            dotfiles: default_dotfiles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    #[serde(default = "default_timezone")]
    pub timezone: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: Option<String>,
    #[serde(default = "default_vimrc")]
    pub vimrc: String,
    #[serde(default = "default_bashrc_block")]
    pub bashrc_block: String,
}

impl Default for BaseSection {
    fn default() -> Self {
        Self {
            enabled: true,
            packages: default_packages(),
            timezone: default_timezone(),
            locale: default_locale(),
            vimrc: default_vimrc(),
            bashrc_block: default_bashrc_block(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_monitoring_server")]
    pub server: String,
    #[serde(default = "default_agent_port")]
    pub port: u16,
    #[serde(default = "default_agent_package")]
    pub package: String,
    #[serde(default = "default_agent_fallback")]
    pub fallback_package: String,
}

impl Default for MonitoringSection {
    fn default() -> Self {
        Self {
            enabled: true,
            server: default_monitoring_server(),
            port: default_agent_port(),
            package: default_agent_package(),
            fallback_package: default_agent_fallback(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
    #[serde(default = "default_true")]
    pub journal: bool,
    #[serde(default)]
    pub journald: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            pace_ms: default_pace_ms(),
            journal: true,
            journald: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_account() -> String {
    constants::DEFAULT_ACCOUNT.to_string()
}

fn default_shell() -> String {
    constants::DEFAULT_SHELL.to_string()
}

fn default_service() -> String {
    constants::DEFAULT_SSH_SERVICE.to_string()
}

fn default_confirm_token() -> String {
    constants::DEFAULT_CONFIRM_TOKEN.to_string()
}

fn default_dotfiles() -> Vec<String> {
    vec![".bashrc".into(), ".vimrc".into(), ".vim".into()]
}

fn default_packages() -> Vec<String> {
    ["vim", "curl", "wget", "htop", "git", "net-tools", "unzip"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timezone() -> Option<String> {
    Some("America/Sao_Paulo".to_string())
}

fn default_locale() -> Option<String> {
    Some("pt_BR.UTF-8".to_string())
}

fn default_vimrc() -> String {
    "syntax on\n\
     set number\n\
     set background=dark\n\
     set tabstop=4\n\
     set shiftwidth=4\n\
     set expandtab\n\
     set hlsearch\n\
     set incsearch\n\
     set mouse-=a\n"
        .to_string()
}

fn default_bashrc_block() -> String {
    "export HISTTIMEFORMAT=\"%F %T \"\n\
     export HISTSIZE=10000\n\
     alias ll='ls -alF --color=auto'\n\
     alias la='ls -A --color=auto'\n\
     PS1='\\[\\e[1;32m\\]\\u@\\h\\[\\e[0m\\]:\\[\\e[1;34m\\]\\w\\[\\e[0m\\]\\$ '\n"
        .to_string()
}

fn default_monitoring_server() -> String {
    "127.0.0.1".to_string()
}

fn default_agent_port() -> u16 {
    constants::DEFAULT_AGENT_PORT
}

fn default_agent_package() -> String {
    "zabbix-agent2".to_string()
}

fn default_agent_fallback() -> String {
    "zabbix-agent".to_string()
}

fn default_pace_ms() -> u64 {
    constants::DEFAULT_PACE_MS
}
