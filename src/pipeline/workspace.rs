//! Scratch workspace for the Act phase
//!
//! One workspace per task execution, removed when dropped so cleanup runs
//! exactly once whether Act succeeds or fails partway through.

use std::io;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::types::FileMap;

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh scratch directory named after the task.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be created.
    pub fn create(task_id: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("sitewright-{task_id}-"))
            .tempdir()?;
        info!(task_id, path = %dir.path().display(), "workspace created");
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write every artifact file into the workspace. Filenames are flat;
    /// collaborators never emit nested paths.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when any file cannot be written.
    pub fn materialize(&self, files: &FileMap) -> io::Result<()> {
        for (name, content) in files {
            std::fs::write(self.dir.path().join(name), content)?;
        }
        debug!(path = %self.dir.path().display(), files = files.len(), "files materialized");
        Ok(())
    }

    /// Remove the workspace now instead of waiting for drop, surfacing any
    /// cleanup error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be removed.
    pub fn cleanup(self) -> io::Result<()> {
        let path = self.dir.path().display().to_string();
        self.dir.close()?;
        debug!(path, "workspace removed");
        Ok(())
    }
}
