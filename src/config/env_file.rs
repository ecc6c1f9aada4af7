//! Environment file model
//!
//! An environment file is a plain-text list of `KEY=VALUE` assignments and
//! `#` comments consumed by a container at start-up, e.g.
//! `config/rabbitmq-config-envs`. Lines are kept in order so the file can be
//! rewritten with only the values changed.

use crate::domain::{EmapError, Result};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix shared by every environment file name
pub const ENV_FILE_SUFFIX: &str = "config-envs";

/// Suffix of environment file templates shipped in repositories
pub const TEMPLATE_SUFFIX: &str = ".EXAMPLE";

/// One line of an environment file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `# ...`, passed through verbatim
    Comment(String),
    /// Blank or otherwise unparseable line, passed through verbatim
    Verbatim(String),
    /// `KEY=VALUE` assignment
    KeyValue { key: String, value: String },
    /// Assignment whose key could not be resolved; keeps its original value
    Unchanged { key: String, value: String },
}

impl Line {
    /// Parses a single line, splitting assignments on the first `=`
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with('#') {
            return Line::Comment(raw.to_string());
        }

        match raw.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Line::KeyValue {
                key: key.to_string(),
                value: value.to_string(),
            },
            _ => Line::Verbatim(raw.to_string()),
        }
    }

    /// Key of an assignment line
    pub fn key(&self) -> Option<&str> {
        match self {
            Line::KeyValue { key, .. } | Line::Unchanged { key, .. } => Some(key),
            Line::Comment(_) | Line::Verbatim(_) => None,
        }
    }

    /// Replaces the value of an assignment line, clearing any unchanged flag
    pub fn set_value(&mut self, new_value: impl Into<String>) {
        if let Line::KeyValue { key, .. } | Line::Unchanged { key, .. } = self {
            *self = Line::KeyValue {
                key: std::mem::take(key),
                value: new_value.into(),
            };
        }
    }

    /// Flags an assignment line as unresolved
    pub fn mark_unchanged(&mut self) {
        if let Line::KeyValue { key, value } = self {
            *self = Line::Unchanged {
                key: std::mem::take(key),
                value: std::mem::take(value),
            };
        }
    }

    /// Whether this line is flagged as unresolved
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Line::Unchanged { .. })
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Comment(raw) | Line::Verbatim(raw) => f.write_str(raw),
            Line::KeyValue { key, value } | Line::Unchanged { key, value } => {
                write!(f, "{key}={value}")
            }
        }
    }
}

/// An environment file identified by its base name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFile {
    basename: String,
    lines: Vec<Line>,
}

impl EnvironmentFile {
    /// Builds a file from its base name and contents
    pub fn parse(basename: impl Into<String>, contents: &str) -> Self {
        Self {
            basename: basename.into(),
            lines: contents.lines().map(Line::parse).collect(),
        }
    }

    /// Reads a file from disk
    ///
    /// A trailing `.EXAMPLE` is dropped from the base name, so templates are
    /// written out under their real name.
    pub fn read(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| EmapError::Io(format!("Invalid file name: {}", path.display())))?;
        let basename = name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(name);

        let contents = fs::read_to_string(path)
            .map_err(|e| EmapError::Io(format!("Failed to read {}: {e}", path.display())))?;

        Ok(Self::parse(basename, &contents))
    }

    /// Base name, e.g. `rabbitmq-config-envs`
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Service name: the base name without the `-config-envs` suffix
    pub fn service_name(&self) -> Option<&str> {
        self.basename
            .strip_suffix(ENV_FILE_SUFFIX)
            .map(|s| s.trim_end_matches('-'))
            .filter(|s| !s.is_empty())
    }

    /// Lines in file order
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Mutable access to the lines for a substitution pass
    pub fn lines_mut(&mut self) -> &mut [Line] {
        &mut self.lines
    }

    /// Sets the value of every assignment of `key`, returning how many changed
    pub fn replace_value_of(&mut self, key: &str, value: &str) -> usize {
        let mut replaced = 0;
        for line in self.lines.iter_mut().filter(|l| l.key() == Some(key)) {
            line.set_value(value);
            replaced += 1;
        }
        replaced
    }

    /// Lines whose key was never resolved
    pub fn unchanged_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|l| l.is_unchanged())
    }

    /// File contents, one line per entry with a trailing newline
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    /// Writes the file into `directory` under its base name
    ///
    /// The contents go to a temporary file in the same directory which is
    /// then renamed over the destination. An existing destination keeps its
    /// permissions; a new file gets the usual `0644`.
    pub fn write(&self, directory: &Path) -> Result<PathBuf> {
        let destination = directory.join(&self.basename);

        let mut temp = tempfile::NamedTempFile::new_in(directory).map_err(|e| {
            EmapError::Io(format!(
                "Failed to create temporary file in {}: {e}",
                directory.display()
            ))
        })?;
        temp.write_all(self.render().as_bytes())?;
        temp.flush()?;

        match fs::metadata(&destination) {
            Ok(existing) => temp.as_file().set_permissions(existing.permissions())?,
            Err(_) => set_new_file_mode(temp.as_file())?,
        }
        temp.persist(&destination).map_err(|e| {
            EmapError::Io(format!("Failed to write {}: {}", destination.display(), e.error))
        })?;

        tracing::debug!(path = %destination.display(), lines = self.lines.len(), "Wrote environment file");
        Ok(destination)
    }
}

#[cfg(unix)]
fn set_new_file_mode(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_new_file_mode(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}

/// Whether a file name denotes an environment file or template
pub fn is_environment_file_name(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    let name = name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(name);
    name.ends_with(ENV_FILE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONTENTS: &str = "# RabbitMQ settings\nRABBITMQ_PORT=5672\n\nURL=http://host/?a=b\n";

    #[test]
    fn test_parse_lines() {
        let file = EnvironmentFile::parse("rabbitmq-config-envs", CONTENTS);
        assert_eq!(file.lines().len(), 4);
        assert!(matches!(file.lines()[0], Line::Comment(_)));
        assert_eq!(file.lines()[1].key(), Some("RABBITMQ_PORT"));
        assert!(matches!(file.lines()[2], Line::Verbatim(_)));
        // Split only on the first '='
        assert_eq!(
            file.lines()[3],
            Line::KeyValue {
                key: "URL".to_string(),
                value: "http://host/?a=b".to_string()
            }
        );
    }

    #[test]
    fn test_render_round_trips_unmodified_file() {
        let file = EnvironmentFile::parse("rabbitmq-config-envs", CONTENTS);
        assert_eq!(file.render(), CONTENTS);
    }

    #[test]
    fn test_replace_value_of() {
        let mut file = EnvironmentFile::parse("hoover-config-envs", "HOOVER_DATE_FROM=X\nOTHER=Y\n");
        assert_eq!(file.replace_value_of("HOOVER_DATE_FROM", "2024-01-01T00:00:00.00Z"), 1);
        assert_eq!(file.replace_value_of("MISSING", "z"), 0);
        assert_eq!(
            file.render(),
            "HOOVER_DATE_FROM=2024-01-01T00:00:00.00Z\nOTHER=Y\n"
        );
    }

    #[test]
    fn test_mark_unchanged_keeps_original_content() {
        let mut file = EnvironmentFile::parse("ids-config-envs", "IDS_SCHEMA=old\n");
        file.lines_mut()[0].mark_unchanged();
        assert_eq!(file.unchanged_lines().count(), 1);
        assert_eq!(file.render(), "IDS_SCHEMA=old\n");

        file.replace_value_of("IDS_SCHEMA", "new");
        assert_eq!(file.unchanged_lines().count(), 0);
    }

    #[test]
    fn test_service_name() {
        let file = EnvironmentFile::parse("rabbitmq-config-envs", "");
        assert_eq!(file.service_name(), Some("rabbitmq"));
        let file = EnvironmentFile::parse("config-envs", "");
        assert_eq!(file.service_name(), None);
    }

    #[test]
    fn test_read_strips_template_suffix_and_write() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("glowroot-config-envs.EXAMPLE");
        fs::write(&template, "GLOWROOT_USERNAME=x\n").unwrap();

        let file = EnvironmentFile::read(&template).unwrap();
        assert_eq!(file.basename(), "glowroot-config-envs");

        let out = TempDir::new().unwrap();
        let written = file.write(out.path()).unwrap();
        assert_eq!(written, out.path().join("glowroot-config-envs"));
        assert_eq!(fs::read_to_string(written).unwrap(), "GLOWROOT_USERNAME=x\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("hoover-config-envs");
        fs::write(&existing, "HOOVER_DATE_FROM=X\n").unwrap();
        fs::set_permissions(&existing, fs::Permissions::from_mode(0o640)).unwrap();

        let mut file = EnvironmentFile::read(&existing).unwrap();
        file.replace_value_of("HOOVER_DATE_FROM", "Y");
        file.write(dir.path()).unwrap();
        let mode = fs::metadata(&existing).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);

        let created = EnvironmentFile::parse("rabbitmq-config-envs", "RABBITMQ_PORT=5672\n")
            .write(dir.path())
            .unwrap();
        let mode = fs::metadata(&created).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_is_environment_file_name() {
        assert!(is_environment_file_name("emap-core-config-envs"));
        assert!(is_environment_file_name("emap-core-config-envs.EXAMPLE"));
        assert!(!is_environment_file_name(".hidden-config-envs"));
        assert!(!is_environment_file_name("docker-compose.yml"));
    }
}
