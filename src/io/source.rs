//! Where record files and magnet metadata come from.
//!
//! Sources are traits so the pipeline does not care whether files live in a
//! local archive or behind a remote service. Only local implementations ship.

use std::path::PathBuf;

use crate::domain::PartType;
use crate::error::FlowError;
use crate::io::workspace::TempWorkspace;

/// Provides the record files of each site.
pub trait RecordSource {
    /// Known site identifiers, sorted.
    fn sites(&self) -> Result<Vec<String>, FlowError>;

    /// Stage up to `max_records` files of `site` into `workspace`, in order.
    ///
    /// Only a failure to list the site is an error; files that cannot be
    /// staged are reported in `StagedFiles::skipped`.
    fn fetch_site(&self, site: &str, workspace: &TempWorkspace, max_records: usize) -> Result<StagedFiles, FlowError>;
}

/// Files staged for one site.
#[derive(Debug, Default)]
pub struct StagedFiles {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<FlowError>,
}

/// Resolves a magnet's part type.
pub trait MagnetCatalog {
    fn part_type(&self, magnet: &str) -> Result<PartType, FlowError>;
}

/// Local archive laid out as `<root>/<site>/*.txt`.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    root: PathBuf,
}

impl ArchiveSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn site_files(&self, site: &str) -> Result<Vec<PathBuf>, FlowError> {
        let dir = self.root.join(site);
        let entries = std::fs::read_dir(&dir).map_err(|e| FlowError::io(&dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| FlowError::io(&dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

impl RecordSource for ArchiveSource {
    fn sites(&self) -> Result<Vec<String>, FlowError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| FlowError::io(&self.root, e))?;
        let mut sites = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| FlowError::io(&self.root, e))?.path();
            if path.is_dir() {
                if let Some(name) = path.file_name() {
                    sites.push(name.to_string_lossy().into_owned());
                }
            }
        }
        sites.sort();
        Ok(sites)
    }

    fn fetch_site(&self, site: &str, workspace: &TempWorkspace, max_records: usize) -> Result<StagedFiles, FlowError> {
        let files = self.site_files(site)?;
        if files.len() > max_records {
            tracing::info!(site, available = files.len(), max_records, "record list truncated");
        }
        let mut staged = StagedFiles::default();
        for src in files.iter().take(max_records) {
            match workspace.stage(src) {
                Ok(path) => staged.files.push(path),
                Err(err) => {
                    tracing::warn!(file = %src.display(), error = %err, "record file not staged; ignored");
                    staged.skipped.push(err);
                }
            }
        }
        Ok(staged)
    }
}

/// Part types known up front (from the command line or a test).
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<(String, PartType)>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, magnet: impl Into<String>, part: PartType) -> Self {
        self.entries.push((magnet.into(), part));
        self
    }
}

impl MagnetCatalog for StaticCatalog {
    fn part_type(&self, magnet: &str) -> Result<PartType, FlowError> {
        self.entries
            .iter()
            .find(|(name, _)| name == magnet)
            .map(|(_, part)| *part)
            .ok_or_else(|| FlowError::InvalidInput(format!("unknown magnet '{magnet}'")))
    }
}
