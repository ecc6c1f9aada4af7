//! Configuration schema types
//!
//! Typed settings that sit alongside the free-form global configuration
//! tree: the optional `validation` section and the runner's own logging
//! configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for a validation run (`validation:` section of the global configuration)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Delay before the core processor is started in the background
    #[serde(default = "default_core_start_delay_secs")]
    pub core_start_delay_secs: u64,

    /// Upper bound on waiting for the broker queues to drain
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Interval between queue depth checks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Queues that must be empty; empty list means every queue on the vhost
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,

    /// Host running the broker management API
    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    /// Broker virtual host
    #[serde(default = "default_broker_vhost")]
    pub broker_vhost: String,

    /// Run only the HL7 source
    #[serde(default)]
    pub use_only_hl7source: bool,

    /// Run only the hoover source
    #[serde(default)]
    pub use_only_hoover: bool,
}

impl ValidationSettings {
    /// Validates the settings
    ///
    /// # Errors
    ///
    /// Returns an error if any values are out of range.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("validation.poll_interval_secs must be greater than 0".to_string());
        }

        if self.drain_timeout_secs < self.poll_interval_secs {
            return Err(format!(
                "validation.drain_timeout_secs ({}) must be at least poll_interval_secs ({})",
                self.drain_timeout_secs, self.poll_interval_secs
            ));
        }

        if self.queues.iter().any(|q| q.trim().is_empty()) {
            return Err("validation.queues cannot contain empty names".to_string());
        }

        if self.broker_host.is_empty() {
            return Err("validation.broker_host cannot be empty".to_string());
        }

        Ok(())
    }

    /// Delay before the background core start
    pub fn core_start_delay(&self) -> Duration {
        Duration::from_secs(self.core_start_delay_secs)
    }

    /// Drain-wait bound
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// Drain-wait polling interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            core_start_delay_secs: default_core_start_delay_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            queues: default_queues(),
            broker_host: default_broker_host(),
            broker_vhost: default_broker_vhost(),
            use_only_hl7source: false,
            use_only_hoover: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    /// Validates the logging configuration
    pub fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_core_start_delay_secs() -> u64 {
    180
}

fn default_drain_timeout_secs() -> u64 {
    10 * 60 * 60
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_queues() -> Vec<String> {
    // hl7source publishes to hl7Queue, hoover to databaseExtracts
    vec!["hl7Queue".to_string(), "databaseExtracts".to_string()]
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_vhost() -> String {
    "/".to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_settings_defaults() {
        let settings = ValidationSettings::default();
        assert_eq!(settings.core_start_delay(), Duration::from_secs(180));
        assert_eq!(settings.drain_timeout(), Duration::from_secs(36000));
        assert_eq!(settings.queues, ["hl7Queue", "databaseExtracts"]);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_settings_partial_yaml() {
        let settings: ValidationSettings =
            serde_yaml::from_str("poll_interval_secs: 5\nqueues: [hl7Queue, databaseExtracts]\n")
                .unwrap();
        assert_eq!(settings.poll_interval_secs, 5);
        assert_eq!(settings.queues.len(), 2);
        assert_eq!(settings.drain_timeout_secs, 36000);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let settings = ValidationSettings {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_timeout_shorter_than_interval_rejected() {
        let settings = ValidationSettings {
            drain_timeout_secs: 10,
            poll_interval_secs: 60,
            ..Default::default()
        };
        assert!(settings.validate().unwrap_err().contains("drain_timeout_secs"));
    }

    #[test]
    fn test_logging_config_rotation() {
        let mut config = LoggingConfig::default();
        assert!(config.validate().is_ok());

        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
