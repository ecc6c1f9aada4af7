// EMAP Runner - configuration templating and validation runs for EMAP
// Copyright (c) 2025 EMAP Contributors
// Licensed under the MIT License

//! # EMAP Runner
//!
//! Tooling for setting up and validating an instance of the EMAP data
//! pipeline, a set of containerized services described by the compose files
//! of several repositories.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Resolving** configuration values from a single hierarchical global
//!   configuration file
//! - **Templating** the per-service `*-config-envs` environment files from
//!   that configuration
//! - **Validating** the full pipeline by replaying a time window of source
//!   data through a freshly started instance
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Validation run orchestration and environment snapshots
//! - [`adapters`] - External integrations (docker compose, RabbitMQ, Glowroot)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Global configuration and environment files
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emap_runner::config::{
//!     create_or_update_config_dir, discover_environment_files, load_global_config,
//! };
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_global_config("global-configuration.yaml")?;
//!
//! // Fill the templates shipped with the emap repository
//! let templates = discover_environment_files(&[PathBuf::from("emap")])?;
//! let report = create_or_update_config_dir(&config, Path::new("config"), templates)?;
//!
//! println!("Wrote {} files", report.written.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Lookup
//!
//! Keys are searched in a fixed order of canonical sections and then at the
//! top level of the file:
//!
//! ```rust,no_run
//! use emap_runner::config::load_global_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_global_config("global-configuration.yaml")?;
//! let port = config.resolve("RABBITMQ_PORT")?;
//! let user = config.resolve_in("glowroot", "GLOWROOT_USERNAME")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All library errors are [`domain::EmapError`]:
//!
//! ```rust,no_run
//! use emap_runner::domain::EmapError;
//!
//! fn example() -> Result<(), EmapError> {
//!     let config = emap_runner::config::load_global_config("global-configuration.yaml")?;
//!     config.resolve("RABBITMQ_PORT")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
