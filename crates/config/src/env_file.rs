//! Persistence of settings into the agent's env file.
//!
//! Updates rewrite `KEY=value` lines in place, prepend keys that were not
//! present, and leave every other line (comments, unrelated keys) untouched.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use warden_core::{Error, Result};
use warden_utils::write_atomic_private;

#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `updates` and write the file back atomically with mode 0600
    pub fn update(&self, updates: &[(&str, String)]) -> Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::file_system(&self.path, "read env file", e)),
        };

        let content = apply_updates(&existing, updates);
        write_atomic_private(&self.path, &content)?;

        tracing::debug!(
            path = %self.path.display(),
            keys = ?updates.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            "env file updated"
        );
        Ok(())
    }
}

fn apply_updates(existing: &str, updates: &[(&str, String)]) -> String {
    let mut lines: Vec<String> = existing.lines().map(str::to_string).collect();
    let mut found = vec![false; updates.len()];

    for line in &mut lines {
        for (i, (key, value)) in updates.iter().enumerate() {
            if line.starts_with(&format!("{key}=")) {
                *line = format!("{key}={value}");
                found[i] = true;
                break;
            }
        }
    }

    let missing: Vec<String> = updates
        .iter()
        .zip(&found)
        .filter(|(_, seen)| !**seen)
        .map(|((key, value), _)| format!("{key}={value}"))
        .collect();
    if !missing.is_empty() {
        lines.splice(0..0, missing);
    }

    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let mut content = lines.join("\n");
    content.push('\n');
    content
}
