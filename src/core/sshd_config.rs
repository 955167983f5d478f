//! Reading and editing SSH daemon configuration files.
//!
//! sshd keeps the first value it obtains for a keyword, and an `Include`
//! pulls other files in at the point where it appears. Edits here only touch
//! the global section (before the first `Match`).

use crate::constants;
use crate::models::policy::HardeningPolicy;
use crate::util::{fs as host_fs, path::rooted};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_INCLUDE_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub value: String,
    pub source: PathBuf,
}

/// Keyword and value of an active (uncommented) line.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let split = line
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(line.len());
    let (key, rest) = line.split_at(split);
    let value = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '=');
    Some((key, value.trim()))
}

/// Keyword of a commented-out directive such as `#PermitRootLogin yes`.
fn commented_keyword(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    parse_line(rest).map(|(key, _)| key)
}

fn is_match(line: &str) -> bool {
    matches!(parse_line(line), Some((key, _)) if key.eq_ignore_ascii_case("Match"))
}

/// Set `key` to `value` in the global section.
///
/// Every active or commented line for `key` is replaced. When there is none,
/// the directive goes before the first `Match` block or at the end.
/// Returns the new content and whether it differs.
pub fn set_directive(content: &str, key: &str, value: &str) -> (String, bool) {
    let wanted = format!("{} {}", key, value);
    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;
    let mut first_match: Option<usize> = None;

    for line in content.lines() {
        if first_match.is_none() && is_match(line) {
            first_match = Some(lines.len());
        }
        let hits = first_match.is_none()
            && (matches!(parse_line(line), Some((k, _)) if k.eq_ignore_ascii_case(key))
                || matches!(commented_keyword(line), Some(k) if k.eq_ignore_ascii_case(key)));
        if hits {
            lines.push(wanted.clone());
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }

    if !replaced {
        match first_match {
            Some(idx) => lines.insert(idx, wanted),
            None => lines.push(wanted),
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    let changed = out != content;
    (out, changed)
}

/// Apply [`set_directive`] to a file, keeping its mode. Returns whether it changed.
pub fn apply_directive(path: &Path, key: &str, value: &str) -> Result<bool> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let (updated, changed) = set_directive(&content, key, value);
    if changed {
        let mode = host_fs::mode_of(path).unwrap_or(0o644);
        host_fs::write_atomic(path, &updated, mode)?;
    }
    Ok(changed)
}

/// Whether `content` sets `key` on an active global line.
pub fn defines(content: &str, key: &str) -> bool {
    for line in content.lines() {
        if is_match(line) {
            return false;
        }
        if matches!(parse_line(line), Some((k, _)) if k.eq_ignore_ascii_case(key)) {
            return true;
        }
    }
    false
}

/// Include line for the drop-in directory.
pub fn include_line() -> String {
    format!("Include {}/*.conf", constants::SSHD_CONFIG_DIR)
}

fn is_drop_in_include(key: &str, value: &str) -> bool {
    key.eq_ignore_ascii_case("Include")
        && value
            .split_whitespace()
            .any(|p| p.starts_with("sshd_config.d/") || p.starts_with(constants::SSHD_CONFIG_DIR))
}

pub fn has_include(content: &str) -> bool {
    content
        .lines()
        .filter_map(parse_line)
        .any(|(key, value)| is_drop_in_include(key, value))
}

/// Whether the drop-in `Include` is the first active directive, so drop-ins
/// take precedence over every base-file setting.
pub fn include_is_first(content: &str) -> bool {
    content
        .lines()
        .find_map(parse_line)
        .is_some_and(|(key, value)| is_drop_in_include(key, value))
}

/// Make the drop-in directory the first thing the base file reads.
///
/// A drop-in `Include` further down the global section is moved to the top.
/// Returns whether the file changed.
pub fn ensure_include(path: &Path) -> Result<bool> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    if include_is_first(&content) {
        return Ok(false);
    }
    let mut lines = vec![include_line()];
    let mut global = true;
    for line in content.lines() {
        if global && is_match(line) {
            global = false;
        }
        let stale = global
            && matches!(parse_line(line), Some((key, value)) if is_drop_in_include(key, value));
        if !stale {
            lines.push(line.to_string());
        }
    }
    let mut updated = lines.join("\n");
    updated.push('\n');
    let mode = host_fs::mode_of(path).unwrap_or(0o644);
    host_fs::write_atomic(path, &updated, mode)?;
    Ok(true)
}

pub fn render_fragment(policy: &HardeningPolicy) -> String {
    let mut out = String::new();
    out.push_str("# Managed by vm-provision. Key-only access; root login disabled.\n");
    for (key, value) in policy.directives() {
        if value.is_empty() {
            out.push_str(&format!("{}\n", key));
        } else {
            out.push_str(&format!("{} {}\n", key, value));
        }
    }
    out
}

/// Global directives in the order sshd reads them, following `Include`s.
///
/// `root` stands in for `/` when resolving include patterns.
pub fn resolved_directives(root: &Path, base: &Path) -> Result<Vec<Directive>> {
    let mut out = Vec::new();
    collect(root, base, 0, &mut out)?;
    Ok(out)
}

fn collect(root: &Path, file: &Path, depth: usize, out: &mut Vec<Directive>) -> Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
        bail!("include depth exceeded at {}", file.display());
    }
    let content =
        fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    for line in content.lines() {
        let Some((key, value)) = parse_line(line) else {
            continue;
        };
        if key.eq_ignore_ascii_case("Match") {
            break;
        }
        if key.eq_ignore_ascii_case("Include") {
            for pattern in value.split_whitespace() {
                for path in expand_include(root, pattern)? {
                    collect(root, &path, depth + 1, out)?;
                }
            }
            continue;
        }
        out.push(Directive {
            key: key.to_string(),
            value: value.to_string(),
            source: file.to_path_buf(),
        });
    }
    Ok(())
}

fn expand_include(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let host_pattern = if pattern.starts_with('/') {
        PathBuf::from(pattern)
    } else {
        Path::new("/etc/ssh").join(pattern)
    };
    let rooted_pattern = rooted(root, &host_pattern);
    let mut paths: Vec<PathBuf> = glob::glob(&rooted_pattern.to_string_lossy())
        .with_context(|| format!("bad include pattern {}", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Value sshd would use for `key`, if any file sets it.
pub fn effective_value(root: &Path, base: &Path, key: &str) -> Result<Option<String>> {
    Ok(resolved_directives(root, base)?
        .into_iter()
        .find(|d| d.key.eq_ignore_ascii_case(key))
        .map(|d| d.value))
}
