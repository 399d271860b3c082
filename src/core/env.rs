//! `KEY=VALUE` configuration file operations.
//!
//! The file stays shell-sourceable: comments and unrelated lines are kept
//! verbatim, and writes touch only the line that carries the key.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, Result};

/// A `KEY=VALUE` file held in memory.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    contents: String,
}

impl EnvFile {
    /// Load an existing file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotInitialized` if the file doesn't exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(ConfigError::NotInitialized(path).into());
        }
        debug!(path = %path.display(), "loading config file");
        let contents = std::fs::read_to_string(&path).map_err(ConfigError::ReadFile)?;
        Ok(Self { path, contents })
    }

    /// Load the file, or start empty if it doesn't exist yet.
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self {
                path,
                contents: String::new(),
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Value of `key`, unquoted. The last assignment wins, as when sourced.
    pub fn get(&self, key: &str) -> Option<String> {
        self.contents
            .lines()
            .filter_map(parse_line)
            .filter(|(k, _)| *k == key)
            .last()
            .map(|(_, v)| unquote(v).to_string())
    }

    /// Whether `key` is assigned on an uncommented line.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`, replacing its line in place or appending a new one.
    pub fn set(&mut self, key: &str, value: &str) {
        debug!(key, "writing config value");
        self.contents = upsert(&self.contents, key, &quote(value));
    }

    /// Write the file back to disk.
    pub fn save(&self) -> Result<()> {
        std::fs::write(&self.path, &self.contents)?;
        Ok(())
    }
}

/// Split an uncommented `KEY=VALUE` line. Blank and `#` lines yield `None`.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Set `key=value` in `contents`.
///
/// The last uncommented assignment is replaced, since that is the one a
/// shell (and [`EnvFile::get`]) sees. Without one, the first commented
/// assignment is uncommented in its place. Otherwise the line is appended.
pub fn upsert(contents: &str, key: &str, value: &str) -> String {
    let assignment = format!("{}={}", key, value);
    let mut lines: Vec<String> = contents.lines().map(String::from).collect();

    let live = lines
        .iter()
        .rposition(|l| parse_line(l).is_some_and(|(k, _)| k == key));
    let target = live.or_else(|| lines.iter().position(|l| assigns(l, key)));

    match target {
        Some(index) => lines[index] = assignment,
        None => lines.push(assignment),
    }

    let mut updated = lines.join("\n");
    updated.push('\n');
    updated
}

/// Whether `line` assigns `key`, allowing a leading `#`.
fn assigns(line: &str, key: &str) -> bool {
    let line = line.trim_start();
    let line = line.strip_prefix('#').map(str::trim_start).unwrap_or(line);
    line.strip_prefix(key)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Quote scalars that a shell would split. Array literals pass through.
fn quote(value: &str) -> String {
    if value.starts_with('(') {
        return value.to_string();
    }
    if value.contains(char::is_whitespace) || value.contains('#') {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}
