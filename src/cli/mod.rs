//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for the EMAP runner using clap.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// EMAP runner - set up, run and validate an instance of EMAP
#[derive(Parser, Debug)]
#[command(name = "emap")]
#[command(version, about, long_about = None)]
#[command(author = "EMAP Contributors")]
pub struct Cli {
    /// Path to the global configuration file
    #[arg(
        short,
        long,
        default_value = "global-configuration.yaml",
        env = "EMAP_CONFIG",
        global = true
    )]
    pub filename: String,

    /// Directory holding the repositories and the config directory
    #[arg(long, default_value = ".", env = "EMAP_MAIN_DIR", global = true)]
    pub main_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "EMAP_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Also write JSON logs to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or update the config directory from the repository templates
    Setup(commands::setup::SetupArgs),

    /// Run docker compose over every repository
    Docker(commands::docker::DockerArgs),

    /// Run a validation of the full pipeline
    Validation(commands::validation::ValidationArgs),

    /// Validate the global configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}
