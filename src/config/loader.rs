//! Global configuration loader with environment variable substitution

use super::global::{GlobalConfiguration, GlobalConfigurationBuilder};
use crate::domain::errors::EmapError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads the global configuration from a YAML file
///
/// This function:
/// 1. Reads the YAML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the YAML tree
/// 4. Injects the derived date stamps and freezes the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - A referenced environment variable is not set
/// - YAML parsing fails
/// - A configured date cannot be parsed
///
/// # Examples
///
/// ```no_run
/// use emap_runner::config::load_global_config;
///
/// let config = load_global_config("global-configuration.yaml").expect("Failed to load config");
/// println!("{}", config.resolve("RABBITMQ_PORT").unwrap());
/// ```
pub fn load_global_config(path: impl AsRef<Path>) -> Result<GlobalConfiguration> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(EmapError::Configuration(format!(
            "Configuration file *{}* not found",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        EmapError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let config = GlobalConfigurationBuilder::from_yaml_str(&contents, path)?.build()?;

    tracing::info!(
        file = %path.display(),
        sections = config.section_names().len(),
        "Loaded global configuration"
    );

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are copied through untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| EmapError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&cap[0], &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(EmapError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}
