//! External system integrations for the EMAP runner.
//!
//! - [`compose`] - `docker compose` command execution behind [`CommandExecutor`]
//! - [`rabbitmq`] - broker queue depth behind [`QueueMonitor`]
//! - [`glowroot`] - Glowroot central admin credential bootstrap
//!
//! # Design Pattern
//!
//! Adapters isolate external processes and services behind traits so the
//! validation orchestrator can be exercised with recording executors and
//! scripted monitors.
//!
//! ```rust,no_run
//! use emap_runner::adapters::compose::{CommandExecutor, ComposeCommand, DockerComposeRunner};
//! use emap_runner::config::load_global_config;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_global_config("global-configuration.yaml")?;
//! let runner = DockerComposeRunner::new(Path::new("."), &config, false)?;
//! runner.execute(&ComposeCommand::Ps, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod compose;
pub mod glowroot;
pub mod rabbitmq;

pub use compose::{CommandExecutor, ComposeCommand, DockerComposeRunner};
pub use glowroot::{setup_glowroot_password, GlowrootCredentials};
pub use rabbitmq::{BrokerSettings, QueueMonitor, RabbitMqManagementClient};
