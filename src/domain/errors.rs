//! Domain error types
//!
//! This module defines the error hierarchy for the EMAP runner.
//! Errors from third-party crates are converted into domain variants so that
//! callers never have to match on `serde_yaml` or `reqwest` types.

use std::path::PathBuf;
use thiserror::Error;

/// Main EMAP runner error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum EmapError {
    /// A key (or section/key path) is absent from the global configuration
    #[error("Failed to find {key} in any part of {}", file.display())]
    MissingKey {
        /// Offending key or dotted path
        key: String,
        /// Global configuration file the lookup was made against
        file: PathBuf,
    },

    /// A date or time-window string could not be parsed
    #[error("Date parse error: {0}")]
    DateParse(String),

    /// Options that cannot be combined were selected together
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A validation run was requested without the explicit run flag
    #[error("Validation run not confirmed: {0}")]
    NotConfirmed(String),

    /// The broker queues did not drain within the bound
    #[error("Waiting for queue timed out after {timeout_secs}s")]
    DrainTimeout {
        /// Bound that was exceeded
        timeout_secs: u64,
    },

    /// An ingestion service finished unsuccessfully
    #[error("Ingestion service {service} failed: {reason}")]
    Ingestion {
        /// Compose service name
        service: String,
        /// Failure description
        reason: String,
    },

    /// A container runtime command failed or exited non-zero
    #[error("Command `{command}` failed{}", exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    Command {
        /// Rendered command line
        command: String,
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
    },

    /// Message broker (management API) errors
    #[error("Broker error: {0}")]
    Broker(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl EmapError {
    /// Creates a missing-key error for the given key and configuration file
    pub fn missing_key(key: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        EmapError::MissingKey {
            key: key.into(),
            file: file.into(),
        }
    }

    /// Whether this error is a missing configuration key
    pub fn is_missing_key(&self) -> bool {
        matches!(self, EmapError::MissingKey { .. })
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for EmapError {
    fn from(err: std::io::Error) -> Self {
        EmapError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for EmapError {
    fn from(err: serde_json::Error) -> Self {
        EmapError::Serialization(err.to_string())
    }
}

// Conversion from YAML parse errors
impl From<serde_yaml::Error> for EmapError {
    fn from(err: serde_yaml::Error) -> Self {
        EmapError::Configuration(format!("YAML parse error: {err}"))
    }
}

impl From<reqwest::Error> for EmapError {
    fn from(err: reqwest::Error) -> Self {
        EmapError::Broker(err.to_string())
    }
}
