//! Environment directory synchronizer
//!
//! Materializes environment files from the global configuration: every
//! assignment whose key resolves gets the configured value, every other
//! assignment is kept as-is and reported.

use super::env_file::{is_environment_file_name, EnvironmentFile, Line};
use super::global::GlobalConfiguration;
use crate::domain::{EmapError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// An assignment left with its original value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedKey {
    /// Environment file base name
    pub file: String,
    /// Original line content
    pub line: String,
}

/// Outcome of a synchronization pass
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Whether the output directory had to be created
    pub created_dir: bool,
    /// Files written, in processing order
    pub written: Vec<PathBuf>,
    /// Every unresolved assignment across all files
    pub unresolved: Vec<UnresolvedKey>,
}

/// Resolves every assignment in `env_file` against `config`
///
/// Sections are tried in order: the file's base name, its service name,
/// then the canonical search.
///
/// # Errors
///
/// Only errors other than a missing key are returned; missing keys mark the
/// line as unchanged.
pub fn substitute_values(config: &GlobalConfiguration, env_file: &mut EnvironmentFile) -> Result<()> {
    let basename = env_file.basename().to_string();
    let service = env_file.service_name().map(str::to_string);

    for line in env_file.lines_mut() {
        let outcome = match line {
            Line::KeyValue { key, .. } => resolve_for_file(config, key, &basename, service.as_deref()),
            _ => continue,
        };

        match outcome {
            Ok(value) => line.set_value(value),
            Err(EmapError::MissingKey { .. }) => line.mark_unchanged(),
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn resolve_for_file(
    config: &GlobalConfiguration,
    key: &str,
    basename: &str,
    service: Option<&str>,
) -> Result<String> {
    for section in std::iter::once(basename).chain(service) {
        if let Ok(value) = config.resolve_in(section, key) {
            return Ok(value);
        }
    }
    config.resolve(key)
}

/// Creates or updates `output_dir` from the given environment files
///
/// Existing contents of the directory are never deleted.
pub fn create_or_update_config_dir(
    config: &GlobalConfiguration,
    output_dir: &Path,
    env_files: Vec<EnvironmentFile>,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    if output_dir.exists() {
        tracing::info!(path = %output_dir.display(), "Updating config directory");
    } else {
        tracing::info!(path = %output_dir.display(), "Creating config directory");
        fs::create_dir_all(output_dir)?;
        report.created_dir = true;
    }

    for mut env_file in env_files {
        substitute_values(config, &mut env_file)?;
        report.written.push(env_file.write(output_dir)?);

        for line in env_file.unchanged_lines() {
            let line = line.to_string();
            tracing::warn!(
                key = %line,
                file = %env_file.basename(),
                source = %config.filename().display(),
                "{:30} in {:11} was not updated from {}",
                truncate(line.trim(), 29),
                truncate(env_file.basename(), 10),
                config.filename().display()
            );
            report.unresolved.push(UnresolvedKey {
                file: env_file.basename().to_string(),
                line,
            });
        }
    }

    Ok(report)
}

/// Collects environment files and templates from `dirs`, sorted by name
///
/// Directories that do not exist are skipped.
pub fn discover_environment_files(dirs: &[PathBuf]) -> Result<Vec<EnvironmentFile>> {
    let mut paths = Vec::new();

    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let is_match = entry
                .file_name()
                .to_str()
                .map(is_environment_file_name)
                .unwrap_or(false);
            if is_match && entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::debug!(count = paths.len(), "Discovered environment files");

    paths.iter().map(|p| EnvironmentFile::read(p)).collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
