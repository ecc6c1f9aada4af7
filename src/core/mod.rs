//! Core orchestration for the EMAP runner.
//!
//! # Modules
//!
//! - [`snapshot`] - Scoped capture and restore of an environment directory
//! - [`validation`] - Validation run orchestration and reporting
//!
//! # Validation Workflow
//!
//! 1. **Snapshot**: Capture the environment files
//! 2. **Inject**: Write the time window into every `*-config-envs` file
//! 3. **Restart**: Tear the stack down and configure Glowroot
//! 4. **Ingest**: Run the selected sources to completion while the core
//!    processor starts in the background
//! 5. **Drain**: Wait for the broker queues to empty
//! 6. **Stop**: Save logs, stop the stack and restore the snapshot
//!
//! # Example
//!
//! ```rust,no_run
//! use emap_runner::adapters::{
//!     BrokerSettings, DockerComposeRunner, GlowrootCredentials, RabbitMqManagementClient,
//! };
//! use emap_runner::config::load_global_config;
//! use emap_runner::core::validation::{RunTimings, ValidationRunner};
//! use emap_runner::domain::TimeWindow;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let main_dir = Path::new("/opt/emap");
//! let config = load_global_config(main_dir.join("global-configuration.yaml"))?;
//! let settings = config.validation_settings()?;
//!
//! let executor = Arc::new(DockerComposeRunner::new(main_dir, &config, false)?);
//! let monitor = Arc::new(RabbitMqManagementClient::new(BrokerSettings::from_config(
//!     &config, &settings,
//! )?)?);
//!
//! let runner = ValidationRunner::new(
//!     executor,
//!     monitor,
//!     TimeWindow::new("7 days ago", "today")?,
//!     main_dir,
//!     GlowrootCredentials::from_config(&config),
//! )
//! .with_timings(RunTimings::from(&settings));
//!
//! let report = runner.run(true).await?;
//! println!("Drained: {}", report.drained);
//! # Ok(())
//! # }
//! ```

pub mod snapshot;
pub mod validation;
