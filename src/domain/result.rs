//! Result type alias for the EMAP runner

use super::errors::EmapError;

/// Result type alias for EMAP runner operations
///
/// # Examples
///
/// ```
/// use emap_runner::domain::result::Result;
/// use emap_runner::domain::errors::EmapError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(EmapError::InvalidOptions("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, EmapError>;
