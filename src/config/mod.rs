//! Configuration management for the EMAP runner.
//!
//! # Overview
//!
//! A single YAML file (`global-configuration.yaml`) is the source of truth
//! for every service of an EMAP instance:
//!
//! ```yaml
//! main_git_dir: https://github.com/inform-health-informatics
//! repositories:
//!   emap:
//!     branch: develop
//!   hoover:
//! rabbitmq:
//!   RABBITMQ_PORT: 5672
//!   RABBITMQ_PASSWORD: ${RABBITMQ_PASSWORD}
//! dates:
//!   start: 2024-01-01
//!   end: null
//! validation:
//!   queues: [hl7Queue]
//! ```
//!
//! - [`loader`] reads the file and substitutes `${VAR_NAME}` placeholders
//! - [`global`] holds the immutable tree and resolves keys with section fallback
//! - [`env_file`] models one `KEY=VALUE` environment file
//! - [`sync`] rewrites a directory of environment files from the tree
//! - [`schema`] typed settings for validation runs and logging
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use emap_runner::config::load_global_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_global_config("global-configuration.yaml")?;
//!
//! // Searches rabbitmq, ids, uds, informdb, omop, dates, global, glowroot, common
//! let port = config.resolve("RABBITMQ_PORT")?;
//! println!("RabbitMQ port: {port}");
//! # Ok(())
//! # }
//! ```

pub mod env_file;
pub mod global;
pub mod loader;
pub mod schema;
pub mod secret;
pub mod sync;

// Re-export commonly used types
pub use env_file::{EnvironmentFile, Line};
pub use global::{GlobalConfiguration, GlobalConfigurationBuilder, CANONICAL_SECTIONS};
pub use loader::load_global_config;
pub use schema::{LoggingConfig, ValidationSettings};
pub use secret::{secret_string, SecretString, SecretValue};
pub use sync::{create_or_update_config_dir, discover_environment_files, SyncReport};
