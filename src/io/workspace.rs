//! Scoped staging directory for downloaded or copied record files.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::FlowError;

/// A temporary directory removed when dropped, whatever the site outcome.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    pub fn new(label: &str) -> Result<Self, FlowError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("flow-params-{label}-"))
            .tempdir()
            .map_err(|e| FlowError::io(std::env::temp_dir(), e))?;
        tracing::debug!(path = %dir.path().display(), "workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy `src` into the workspace, keeping its file name.
    pub fn stage(&self, src: &Path) -> Result<PathBuf, FlowError> {
        let name = src
            .file_name()
            .ok_or_else(|| FlowError::InvalidInput(format!("'{}' has no file name", src.display())))?;
        let dest = self.dir.path().join(name);
        std::fs::copy(src, &dest).map_err(|e| FlowError::io(src, e))?;
        Ok(dest)
    }
}
