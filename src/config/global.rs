//! Hierarchical global configuration
//!
//! The global configuration is the single source of truth for every service
//! in an EMAP instance: a YAML tree of sections, each a flat mapping from key
//! to value. It is loaded into a [`GlobalConfigurationBuilder`], which injects
//! the derived date stamps, and then frozen into an immutable
//! [`GlobalConfiguration`].

use super::schema::ValidationSettings;
use crate::domain::{EmapError, Repository, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Canonical sections, in the order searched by [`GlobalConfiguration::resolve`]
///
/// The list is not exhaustive: other sections are kept in the tree but are
/// only reachable through an explicit section lookup.
pub const CANONICAL_SECTIONS: [&str; 9] = [
    "rabbitmq", "ids", "uds", "informdb", "omop", "dates", "global", "glowroot", "common",
];

/// Key holding the per-repository settings
pub const REPOSITORIES_KEY: &str = "repositories";

/// Top-level key holding the base URL shared by all repositories
pub const GIT_DIR_KEY: &str = "main_git_dir";

/// Derived key holding the IDS start stamp
pub const IDS_START_KEY: &str = "IDS_CFG_DEFAULT_START_DATETIME";

/// Derived key holding the IDS end stamp
pub const IDS_END_KEY: &str = "IDS_CFG_END_DATETIME";

const VALIDATION_SECTION: &str = "validation";

/// Mutable stage of a global configuration
///
/// Derived values are computed in [`build`](Self::build); nothing can change
/// the tree afterwards.
#[derive(Debug, Clone)]
pub struct GlobalConfigurationBuilder {
    tree: Mapping,
    filename: PathBuf,
}

impl GlobalConfigurationBuilder {
    /// Starts from an already parsed tree
    pub fn new(tree: Mapping, filename: impl Into<PathBuf>) -> Self {
        Self {
            tree,
            filename: filename.into(),
        }
    }

    /// Parses a YAML document
    ///
    /// An empty document yields an empty tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or its root is not a mapping.
    pub fn from_yaml_str(contents: &str, filename: impl Into<PathBuf>) -> Result<Self> {
        let filename = filename.into();
        let tree = match serde_yaml::from_str::<Value>(contents)? {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            _ => {
                return Err(EmapError::Configuration(format!(
                    "{} must contain a mapping at the top level",
                    filename.display()
                )))
            }
        };
        Ok(Self::new(tree, filename))
    }

    /// Injects the derived values and freezes the configuration
    ///
    /// # Errors
    ///
    /// Returns [`EmapError::DateParse`] if `dates.start` or `dates.end` is not
    /// a recognisable date.
    pub fn build(mut self) -> Result<GlobalConfiguration> {
        let start = self.date_stamp("start")?;
        let end = self.date_stamp("end")?;

        let ids_key = Value::from("ids");
        if !matches!(self.tree.get(&ids_key), Some(Value::Mapping(_))) {
            self.tree.insert(ids_key.clone(), Value::Mapping(Mapping::new()));
        }
        if let Some(Value::Mapping(ids)) = self.tree.get_mut(&ids_key) {
            ids.insert(Value::from(IDS_START_KEY), Value::from(start));
            ids.insert(Value::from(IDS_END_KEY), Value::from(end));
        }

        tracing::debug!(
            file = %self.filename.display(),
            sections = self.tree.len(),
            "Global configuration built"
        );

        Ok(GlobalConfiguration {
            tree: self.tree,
            filename: self.filename,
        })
    }

    /// Java-style stamp for `dates.<name>`, or a single space when absent
    fn date_stamp(&self, name: &str) -> Result<String> {
        let value = self
            .tree
            .get("dates")
            .and_then(Value::as_mapping)
            .and_then(|dates| dates.get(name));

        match value {
            None | Some(Value::Null) => Ok(" ".to_string()),
            Some(value) => {
                let raw = render_value(value);
                let datetime = parse_config_datetime(&raw).ok_or_else(|| {
                    EmapError::DateParse(format!(
                        "dates.{name} = {raw} in {} is not a date",
                        self.filename.display()
                    ))
                })?;
                Ok(datetime.format("%Y-%m-%dT%H:%M:%S.00Z").to_string())
            }
        }
    }
}

/// Immutable global configuration
#[derive(Debug, Clone)]
pub struct GlobalConfiguration {
    tree: Mapping,
    filename: PathBuf,
}

impl GlobalConfiguration {
    /// File this configuration was loaded from
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Names of every top-level mapping section, in file order
    pub fn section_names(&self) -> Vec<String> {
        self.tree
            .iter()
            .filter(|(_, value)| value.is_mapping())
            .filter_map(|(key, _)| key.as_str().map(str::to_string))
            .collect()
    }

    /// Whether a section of the given name is present
    pub fn contains_section(&self, section: &str) -> bool {
        self.section(section).is_some()
    }

    /// Resolves a bare key
    ///
    /// Canonical sections are searched in [`CANONICAL_SECTIONS`] order, then
    /// the top level of the tree.
    ///
    /// # Errors
    ///
    /// Returns [`EmapError::MissingKey`] naming the key and this file.
    pub fn resolve(&self, key: &str) -> Result<String> {
        for section in CANONICAL_SECTIONS {
            if let Some(value) = self.section(section).and_then(|s| s.get(key)) {
                return Ok(render_value(value));
            }
        }

        self.tree
            .get(key)
            .map(render_value)
            .ok_or_else(|| self.missing(key))
    }

    /// Resolves a bare key, looking in `section` before the canonical search
    pub fn resolve_preferring(&self, key: &str, section: &str) -> Result<String> {
        if let Some(value) = self.section(section).and_then(|s| s.get(key)) {
            return Ok(render_value(value));
        }
        self.resolve(key)
    }

    /// Resolves `section -> key` with no fallback
    pub fn resolve_in(&self, section: &str, key: &str) -> Result<String> {
        self.section(section)
            .and_then(|s| s.get(key))
            .map(render_value)
            .ok_or_else(|| self.missing(&format!("{section}.{key}")))
    }

    /// Resolves `section -> key -> subkey`, e.g. `repositories -> emap -> branch`
    pub fn resolve_nested(&self, section: &str, key: &str, subkey: &str) -> Result<String> {
        self.section(section)
            .and_then(|s| s.get(key))
            .and_then(Value::as_mapping)
            .and_then(|m| m.get(subkey))
            .map(render_value)
            .ok_or_else(|| self.missing(&format!("{section}.{key}.{subkey}")))
    }

    /// Repositories listed under `repositories`, in file order
    ///
    /// An entry with an empty body is named after its key; otherwise
    /// `repo_name` and `branch` fall back to the key and `default_branch`.
    pub fn resolve_repositories(&self, default_branch: &str) -> Result<Vec<Repository>> {
        let entries = self
            .tree
            .get(REPOSITORIES_KEY)
            .and_then(Value::as_mapping)
            .ok_or_else(|| self.missing(REPOSITORIES_KEY))?;
        let source_url = self
            .tree
            .get(GIT_DIR_KEY)
            .map(render_value)
            .ok_or_else(|| self.missing(GIT_DIR_KEY))?;

        let mut repositories = Vec::with_capacity(entries.len());
        for (key, body) in entries {
            let key = render_value(key);
            let field = |name: &str| {
                body.as_mapping()
                    .and_then(|m| m.get(name))
                    .filter(|v| !v.is_null())
                    .map(render_value)
            };

            repositories.push(Repository::new(
                field("repo_name").unwrap_or_else(|| key.clone()),
                source_url.clone(),
                field("branch").unwrap_or_else(|| default_branch.to_string()),
            ));
        }

        Ok(repositories)
    }

    /// Settings for validation runs from the optional `validation` section
    pub fn validation_settings(&self) -> Result<ValidationSettings> {
        let settings = match self.tree.get(VALIDATION_SECTION) {
            None | Some(Value::Null) => ValidationSettings::default(),
            Some(value) => serde_yaml::from_value(value.clone()).map_err(|e| {
                EmapError::Configuration(format!(
                    "Invalid {VALIDATION_SECTION} section in {}: {e}",
                    self.filename.display()
                ))
            })?,
        };

        settings.validate().map_err(EmapError::Configuration)?;
        Ok(settings)
    }

    fn section(&self, name: &str) -> Option<&Mapping> {
        self.tree.get(name).and_then(Value::as_mapping)
    }

    fn missing(&self, key: &str) -> EmapError {
        EmapError::missing_key(key, &self.filename)
    }
}

/// Renders a scalar the way it is written into an environment file
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Tagged(tagged) => render_value(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn parse_config_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_end_matches('Z');

    [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
