//! CLI command implementations

pub mod docker;
pub mod setup;
pub mod validate;
pub mod validation;

use crate::domain::EmapError;

/// Process exit code for a domain error
///
/// 1 for a validation run that did not finish cleanly, 2 for configuration
/// and usage errors, 4 for container or broker failures, 5 otherwise.
pub fn exit_code_for(error: &EmapError) -> i32 {
    match error {
        EmapError::DrainTimeout { .. } | EmapError::Ingestion { .. } => 1,
        EmapError::MissingKey { .. }
        | EmapError::DateParse(_)
        | EmapError::InvalidOptions(_)
        | EmapError::NotConfirmed(_)
        | EmapError::Configuration(_) => 2,
        EmapError::Command { .. } | EmapError::Broker(_) => 4,
        EmapError::Serialization(_) | EmapError::Io(_) => 5,
    }
}
