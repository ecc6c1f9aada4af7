//! Setup command implementation
//!
//! Synchronizes the environment file templates shipped in the checked-out
//! repositories into the instance's config directory.

use super::exit_code_for;
use crate::config::{create_or_update_config_dir, discover_environment_files, load_global_config};
use crate::core::validation::runner::ENV_DIR_NAME;
use crate::domain::{Repository, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments for the setup command
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Directory to write environment files to [default: <main-dir>/config]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

impl SetupArgs {
    /// Execute the setup command
    pub async fn execute(&self, config_path: &str, main_dir: &Path) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, main_dir = %main_dir.display(), "Starting setup command");

        let config = match load_global_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load configuration file: {e}");
                return Ok(2);
            }
        };

        let repositories = match config.resolve_repositories("master") {
            Ok(r) => r,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| main_dir.join(ENV_DIR_NAME));

        let env_files = template_dirs(main_dir, &repositories)
            .and_then(|dirs| discover_environment_files(&dirs));
        let env_files = match env_files {
            Ok(files) => files,
            Err(e) => {
                eprintln!("❌ Failed to read environment file templates: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if env_files.is_empty() {
            println!(
                "⚠️  No environment file templates found in the repositories under {}",
                main_dir.display()
            );
        }

        let report = match create_or_update_config_dir(&config, &output_dir, env_files) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Config directory synchronization failed");
                eprintln!("❌ Failed to write config directory: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!();
        println!("📊 Setup Summary:");
        println!(
            "  Config directory: {} ({})",
            output_dir.display(),
            if report.created_dir { "created" } else { "updated" }
        );
        println!("  Files written: {}", report.written.len());
        println!("  Unresolved keys: {}", report.unresolved.len());

        if !report.unresolved.is_empty() {
            println!();
            println!("⚠️  Not updated from {}:", config.filename().display());
            for unresolved in &report.unresolved {
                println!("  - {} in {}", unresolved.line.trim(), unresolved.file);
            }
        }
        println!();
        println!("✅ Setup complete");

        Ok(0)
    }
}

/// Each repository directory and its immediate non-hidden subdirectories
fn template_dirs(main_dir: &Path, repositories: &[Repository]) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();

    for repo in repositories {
        let repo_dir = repo.path_in(main_dir);
        if !repo_dir.is_dir() {
            tracing::warn!(repository = %repo, path = %repo_dir.display(), "Repository not checked out");
            continue;
        }

        for entry in fs::read_dir(&repo_dir)? {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.push(repo_dir);
    }

    Ok(dirs)
}
