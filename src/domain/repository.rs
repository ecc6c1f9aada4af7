//! Source repositories that make up an EMAP instance

use std::fmt;
use std::path::{Path, PathBuf};

/// A repository checked out alongside the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Directory / repository name, e.g. `emap`
    pub name: String,
    /// Base URL shared by every repository, e.g. `https://github.com/inform-health-informatics`
    pub source_url: String,
    /// Branch to check out
    pub branch: String,
}

impl Repository {
    /// Creates a new repository description
    pub fn new(
        name: impl Into<String>,
        source_url: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            branch: branch.into(),
        }
    }

    /// Full remote URL of this repository
    pub fn remote_url(&self) -> String {
        format!("{}/{}", self.source_url.trim_end_matches('/'), self.name)
    }

    /// Location of the checkout under `main_dir`
    pub fn path_in(&self, main_dir: &Path) -> PathBuf {
        main_dir.join(&self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.branch)
    }
}
