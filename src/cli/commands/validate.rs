//! Validate config command implementation
//!
//! This module implements the `validate-config` command for checking the
//! global configuration file and printing what it resolves to.

use crate::config::global::{IDS_END_KEY, IDS_START_KEY};
use crate::config::load_global_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_global_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let repositories = match config.resolve_repositories("master") {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Repository configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let settings = match config.validation_settings() {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Validation settings are invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Sections: {}", config.section_names().join(", "));
        println!("  Repositories:");
        for repo in &repositories {
            println!("    - {} <- {}", repo, repo.remote_url());
        }
        for key in [IDS_START_KEY, IDS_END_KEY] {
            let value = config.resolve_in("ids", key).unwrap_or_default();
            println!("  {key}: {}", if value.trim().is_empty() { "(unset)" } else { &value });
        }
        println!("  Validation:");
        println!("    Core start delay: {}s", settings.core_start_delay_secs);
        println!("    Drain timeout: {}s", settings.drain_timeout_secs);
        println!("    Poll interval: {}s", settings.poll_interval_secs);
        println!("    Queues: {:?}", settings.queues);
        println!();

        Ok(0)
    }
}
