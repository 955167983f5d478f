//! Append-only journal of phase outcomes, one JSON object per line.

use crate::constants;
use crate::util::fs as host_fs;
use crate::util::host::Host;
use crate::util::journald;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Started,
    Completed,
    Failed,
}

impl Outcome {
    fn priority(self) -> &'static str {
        match self {
            Outcome::Failed => "err",
            Outcome::Started | Outcome::Completed => "info",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub phase: String,
    pub outcome: Outcome,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn detect_actor() -> String {
    if let Ok(user) = std::env::var("SUDO_USER") {
        if !user.is_empty() {
            return format!("{}(sudo)", user);
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: Option<PathBuf>,
    journald: bool,
}

impl Journal {
    pub fn new(path: Option<PathBuf>, journald: bool) -> Self {
        Self { path, journald }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one phase event. Never fails the run; problems become warnings.
    pub fn record(&self, host: &dyn Host, phase: &str, outcome: Outcome, detail: Option<&str>) {
        let entry = JournalEntry {
            timestamp: Utc::now(),
            phase: phase.to_string(),
            outcome,
            actor: detect_actor(),
            detail: detail.map(str::to_string),
        };
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!("cannot serialize journal entry: {}", e);
                return;
            }
        };
        if let Some(path) = &self.path {
            if let Err(e) = append(path, &line) {
                warn!("journal write failed: {:#}", e);
            }
        }
        if self.journald {
            journald::forward_line(host, outcome.priority(), &line);
        }
    }
}

fn append(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    host_fs::append_line(path, line)?;
    host_fs::set_permissions(path, constants::JOURNAL_MODE)
}

/// Read entries back, skipping malformed lines. `limit` keeps the newest.
pub fn read_entries(path: &Path, limit: Option<usize>) -> Result<Vec<JournalEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path).with_context(|| format!("open journal {}", path.display()))?;
    let mut entries = Vec::new();
    let mut malformed = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.context("read journal line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(_) => malformed += 1,
        }
    }
    if malformed > 0 {
        warn!("{} malformed journal entries skipped", malformed);
    }
    if let Some(limit) = limit {
        if entries.len() > limit {
            entries = entries.split_off(entries.len() - limit);
        }
    }
    Ok(entries)
}
