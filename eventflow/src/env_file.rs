//! `.env` diagnostics and repair.
//!
//! Hand-edited env files break in quiet ways: spaces around `=`, a BOM from
//! an editor, a line without `=`. [`diagnose`] reports every line (masking
//! secrets) and [`normalize`] rewrites the file into the form `dotenvy`
//! expects.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::credentials::{CredentialKeys, Credentials};
use crate::errors::FlowError;

const MASK: &str = "*****";

/// One non-blank line of an env file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvLine {
    Entry {
        line: usize,
        key: String,
        value: String,
    },
    Comment {
        line: usize,
    },
    Invalid {
        line: usize,
        content: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvReport {
    /// Number of physical lines in the file, blank ones included
    pub total_lines: usize,
    pub lines: Vec<EnvLine>,
}

impl EnvReport {
    pub fn invalid_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, EnvLine::Invalid { .. }))
            .count()
    }

    pub fn has_key(&self, wanted: &str) -> bool {
        self.lines
            .iter()
            .any(|l| matches!(l, EnvLine::Entry { key, .. } if key == wanted))
    }
}

impl fmt::Display for EnvReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} lines in env file.", self.total_lines)?;
        for line in &self.lines {
            match line {
                EnvLine::Entry { line, key, value } => {
                    writeln!(f, "Line {line}: Key=['{key}'] Value=['{value}']")?
                }
                EnvLine::Comment { line } => writeln!(f, "Line {line}: comment")?,
                EnvLine::Invalid { line, content } => {
                    writeln!(f, "Line {line} is INVALID: '{content}' (missing '=')")?
                }
            }
        }
        Ok(())
    }
}

fn is_secret(key: &str) -> bool {
    let upper = key.to_uppercase();
    upper.contains("PASSWORD") || upper.contains("SECRET") || upper.contains("TOKEN")
}

fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Report every non-blank line. Secret values are masked.
pub fn diagnose(content: &str) -> EnvReport {
    let content = strip_bom(content);
    let mut report = EnvReport {
        total_lines: content.lines().count(),
        lines: Vec::new(),
    };

    for (i, raw) in content.lines().enumerate() {
        let line = i + 1;
        let clean = raw.trim();
        if clean.is_empty() {
            continue;
        }
        if clean.starts_with('#') {
            report.lines.push(EnvLine::Comment { line });
            continue;
        }
        match clean.split_once('=') {
            Some((key, value)) => {
                let key = key.trim().to_string();
                let value = if is_secret(&key) {
                    MASK.to_string()
                } else {
                    value.trim().to_string()
                };
                report.lines.push(EnvLine::Entry { line, key, value });
            }
            None => report.lines.push(EnvLine::Invalid {
                line,
                content: clean.to_string(),
            }),
        }
    }

    report
}

/// Rewrite `content` as `KEY=value` lines: no BOM, no padding around `=`,
/// comments kept, lines without `=` dropped.
pub fn normalize(content: &str) -> String {
    let mut out = String::new();
    for raw in strip_bom(content).lines() {
        let clean = raw.trim();
        if clean.is_empty() {
            continue;
        }
        if clean.starts_with('#') {
            out.push_str(clean);
            out.push('\n');
            continue;
        }
        if let Some((key, value)) = clean.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            out.push_str(key);
            out.push('=');
            out.push_str(value.trim());
            out.push('\n');
        }
    }
    out
}

/// Quote values `dotenvy` would otherwise cut, expand or unescape.
///
/// Single quotes are literal to `dotenvy`; double quotes (with `\`, `"` and
/// `$` escaped) are only used when the value itself holds a `'`.
fn quote_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '$' | '\\' | '#' | '"' | '\''));
    if !needs_quotes {
        value.to_string()
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        let escaped = value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('$', "\\$");
        format!("\"{escaped}\"")
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Replace the value of `key` in normalised `content`, or append it.
pub fn upsert(content: &str, key: &str, value: &str) -> String {
    let value = quote_value(value);
    let mut replaced = false;
    let mut out = String::new();
    for line in content.lines() {
        match line.split_once('=') {
            Some((k, _)) if k == key && !line.starts_with('#') => {
                if !replaced {
                    out.push_str(&format!("{key}={value}\n"));
                    replaced = true;
                }
            }
            _ => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    if !replaced {
        out.push_str(&format!("{key}={value}\n"));
    }
    out
}

/// Parse `content` the way the credential loader will and check that every
/// update reads back unchanged.
fn check_round_trip(content: &str, updates: &[(String, String)]) -> Result<(), FlowError> {
    let parsed = dotenvy::from_read_iter(content.as_bytes())
        .collect::<Result<HashMap<String, String>, _>>()
        .map_err(|e| FlowError::Config(format!("Rewritten env file would not parse: {e}")))?;
    for (key, value) in updates {
        if parsed.get(key) != Some(value) {
            return Err(FlowError::Config(format!(
                "Rewritten env file would not load {key} as given"
            )));
        }
    }
    Ok(())
}

/// Outcome of a rewrite that reached the disk.
#[derive(Debug)]
pub struct EnvFix {
    pub path: PathBuf,
    pub updated: usize,
    /// Credentials reloaded from the rewritten file.
    pub credentials: Result<Credentials, FlowError>,
}

/// Normalise the file at `path`, apply `updates`, write it back and reload
/// credentials from it.
///
/// An `Err` means the file was left untouched. Incomplete credentials after a
/// successful write are reported through [`EnvFix::credentials`].
pub fn fix_env_file(
    path: &Path,
    updates: &[(String, String)],
    keys: &CredentialKeys,
) -> Result<EnvFix, FlowError> {
    if let Some((key, _)) = updates.iter().find(|(key, _)| !is_valid_key(key)) {
        return Err(FlowError::Config(format!("Invalid env key {key:?}")));
    }

    let original = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(FlowError::EnvFile {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut content = normalize(&original);
    for (key, value) in updates {
        content = upsert(&content, key, value);
    }
    check_round_trip(&content, updates)?;

    std::fs::write(path, &content).map_err(|source| FlowError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), updated = updates.len(), "Rewrote env file");

    Ok(EnvFix {
        path: path.to_path_buf(),
        updated: updates.len(),
        credentials: Credentials::load(Some(path), keys),
    })
}
