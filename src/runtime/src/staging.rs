//! Per-load staging area.
//!
//! A staging area is a uniquely named temporary directory owned by a single
//! load. It is removed recursively when the value is dropped, so every exit
//! path of the load (including `?` early returns and panics) cleans up.

use std::path::{Path, PathBuf};

use imgstore_core::error::{Result, StoreError};
use tempfile::TempDir;

const STAGING_PREFIX: &str = "imgstore-import-";

/// Name of the directory the bundle is extracted into.
pub const REPO_DIR: &str = "repo";

/// Name of the optional tag index inside a bundle.
pub const REPOSITORIES_FILE: &str = "repositories";

/// Scratch directory for one load.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    repo_dir: PathBuf,
}

impl StagingArea {
    /// Create a fresh staging area under `parent`, or the system temp dir.
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let parent = parent.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&parent).map_err(|e| StoreError::file(&parent, e))?;
        let dir = builder
            .tempdir_in(&parent)
            .map_err(|e| StoreError::file(&parent, e))?;

        let repo_dir = dir.path().join(REPO_DIR);
        std::fs::create_dir(&repo_dir).map_err(|e| StoreError::file(&repo_dir, e))?;

        tracing::debug!(path = %dir.path().display(), "Created staging area");

        Ok(Self { dir, repo_dir })
    }

    /// Root of the staging area.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory the bundle is extracted into.
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Staged directory of one image.
    pub fn image_dir(&self, id: &str) -> PathBuf {
        self.repo_dir.join(id)
    }

    /// Staged tag index.
    pub fn repositories_path(&self) -> PathBuf {
        self.repo_dir.join(REPOSITORIES_FILE)
    }

    /// Names of the top-level directories in the staged bundle.
    pub fn image_dirs(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.repo_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
