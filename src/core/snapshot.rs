//! Scoped environment snapshot
//!
//! Captures every regular file in a directory and writes the captured bytes
//! back when the snapshot is restored or dropped, whichever comes first.
//! Files created inside the scope are left alone.

use crate::domain::{EmapError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Original contents of a directory's files, restored on release
#[derive(Debug)]
pub struct EnvironmentSnapshot {
    files: BTreeMap<PathBuf, Vec<u8>>,
    restored: bool,
}

impl EnvironmentSnapshot {
    /// Reads every regular file in `dir`, keyed by absolute path
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any file cannot be read; nothing
    /// is captured in that case.
    pub fn capture(dir: &Path) -> Result<Self> {
        let dir = dir.canonicalize().map_err(|e| {
            EmapError::Io(format!("Cannot snapshot {}: {e}", dir.display()))
        })?;

        let mut files = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let contents = fs::read(&path)
                .map_err(|e| EmapError::Io(format!("Failed to read {}: {e}", path.display())))?;
            files.insert(path, contents);
        }

        tracing::debug!(dir = %dir.display(), files = files.len(), "Captured environment snapshot");
        Ok(Self {
            files,
            restored: false,
        })
    }

    /// Paths captured by this snapshot
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Writes every captured file back
    ///
    /// All files are attempted even if one fails; the first error is returned.
    pub fn restore(mut self) -> Result<()> {
        let result = self.restore_all();
        self.restored = true;
        result
    }

    fn restore_all(&self) -> Result<()> {
        let mut first_error = None;
        for (path, contents) in &self.files {
            if let Err(e) = fs::write(path, contents) {
                tracing::error!(path = %path.display(), error = %e, "Failed to restore environment file");
                first_error.get_or_insert_with(|| {
                    EmapError::Io(format!("Failed to restore {}: {e}", path.display()))
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::debug!(files = self.files.len(), "Restored environment snapshot");
                Ok(())
            }
        }
    }
}

impl Drop for EnvironmentSnapshot {
    fn drop(&mut self) {
        if !self.restored {
            // Errors are already logged per file
            let _ = self.restore_all();
        }
    }
}
