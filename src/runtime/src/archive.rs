//! Bundle archive extraction.
//!
//! Unpacks an uncompressed tar stream into a destination directory, skipping
//! the subtrees named by the exclude patterns. Every entry is unpacked with
//! [`tar::Entry::unpack_in`], which refuses absolute paths and `..`
//! components, so nothing is written outside the destination.

use std::io::Read;
use std::path::{Component, Path};

use imgstore_core::error::{Result, StoreError};
use tar::Archive;

/// Options controlling extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Top-level entry names to skip, together with everything beneath them
    pub exclude_patterns: Vec<String>,
}

impl ExtractOptions {
    /// Options excluding the given top-level names.
    pub fn excluding(patterns: Vec<String>) -> Self {
        Self {
            exclude_patterns: patterns,
        }
    }

    /// Whether `path` falls under an excluded top-level name.
    fn is_excluded(&self, path: &Path) -> bool {
        let first = path.components().find_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        });

        match first {
            Some(name) => self
                .exclude_patterns
                .iter()
                .any(|pattern| name == pattern.as_str()),
            None => false,
        }
    }
}

/// Extract `reader` into `dest`, honoring `options`.
///
/// The destination must already exist. On failure, whatever was already
/// written stays in place; callers extract into scratch space they own.
pub fn extract<R: Read>(reader: R, dest: &Path, options: &ExtractOptions) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_overwrite(true);
    archive.set_preserve_permissions(false);

    let entries = archive
        .entries()
        .map_err(|e| StoreError::ArchiveError(format!("Failed to read archive: {}", e)))?;

    let mut unpacked = 0usize;
    let mut skipped = 0usize;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| StoreError::ArchiveError(format!("Failed to read archive entry: {}", e)))?;
        let path = entry
            .path()
            .map_err(|e| StoreError::ArchiveError(format!("Invalid entry path: {}", e)))?
            .into_owned();

        if options.is_excluded(&path) {
            skipped += 1;
            continue;
        }

        let written = entry.unpack_in(dest).map_err(|e| {
            StoreError::ArchiveError(format!(
                "Failed to extract {} to {}: {}",
                path.display(),
                dest.display(),
                e
            ))
        })?;
        if written {
            unpacked += 1;
        } else {
            tracing::warn!(path = %path.display(), "Skipped archive entry outside destination");
        }
    }

    tracing::debug!(
        dest = %dest.display(),
        unpacked,
        skipped,
        "Extracted archive"
    );

    Ok(())
}
