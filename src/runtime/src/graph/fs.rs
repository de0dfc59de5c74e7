//! Filesystem-backed image graph.
//!
//! Each image lives in its own directory named by ID:
//!
//! ```text
//! <root>/
//! ├── <id>/
//! │   ├── json        (image metadata)
//! │   ├── layer.tar   (filesystem diff)
//! │   ├── layersize   (layer size in bytes)
//! │   └── checksum    (sha256 of layer.tar)
//! └── _tmp/           (scratch space for in-progress registrations)
//! ```
//!
//! Registration writes into a scratch directory and renames it into place,
//! so a directory under `<root>/<id>` is always complete.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use imgstore_core::error::{Result, StoreError};
use imgstore_core::image::{truncate_id, validate_id, ImageMetadata};
use sha2::{Digest, Sha256};

use super::ImageGraph;

const TMP_DIR_NAME: &str = "_tmp";

/// Image graph stored as plain directories on disk.
#[derive(Debug)]
pub struct FsGraph {
    /// Root directory of the graph
    root: PathBuf,
}

impl FsGraph {
    /// Open (or create) a graph rooted at `root`.
    ///
    /// Leftover scratch directories from interrupted registrations are removed.
    pub fn new(root: &Path) -> Result<Self> {
        let tmp = root.join(TMP_DIR_NAME);
        if tmp.exists() {
            std::fs::remove_dir_all(&tmp).map_err(|e| {
                StoreError::GraphError(format!(
                    "Failed to clean scratch directory {}: {}",
                    tmp.display(),
                    e
                ))
            })?;
        }
        std::fs::create_dir_all(&tmp).map_err(|e| {
            StoreError::GraphError(format!(
                "Failed to create graph directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Root directory of the graph.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn image_dir(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join(id))
    }
}

impl ImageGraph for FsGraph {
    fn exists(&self, id: &str) -> bool {
        match self.image_dir(id) {
            Ok(dir) => dir.join("json").is_file(),
            Err(_) => false,
        }
    }

    fn get(&self, id: &str) -> Result<ImageMetadata> {
        let path = self.image_dir(id)?.join("json");
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::ImageNotFound(id.to_string()))
            }
            Err(e) => return Err(StoreError::file(&path, e)),
        };
        ImageMetadata::from_json(&data)
    }

    fn map(&self) -> Result<HashMap<String, ImageMetadata>> {
        let read_dir = std::fs::read_dir(&self.root).map_err(|e| {
            StoreError::GraphError(format!(
                "Failed to read graph directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut images = HashMap::new();
        for entry in read_dir {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if validate_id(&name).is_err() || !self.exists(&name) {
                continue;
            }
            let image = self.get(&name)?;
            images.insert(name, image);
        }

        Ok(images)
    }

    fn register(&self, image: &ImageMetadata, layer: &mut dyn Read) -> Result<()> {
        let target = self.image_dir(&image.id)?;
        if self.exists(&image.id) {
            return Err(StoreError::ImageExists(image.id.clone()));
        }
        if !image.is_root() && !self.exists(&image.parent) {
            return Err(StoreError::ParentMissing {
                id: image.id.clone(),
                parent: image.parent.clone(),
            });
        }

        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", truncate_id(&image.id)))
            .tempdir_in(self.root.join(TMP_DIR_NAME))
            .map_err(|e| {
                StoreError::GraphError(format!("Failed to create scratch directory: {}", e))
            })?;

        std::fs::write(scratch.path().join("json"), image.to_json()?)?;

        let file = File::create(scratch.path().join("layer.tar"))?;
        let mut writer = HashingWriter::new(BufWriter::new(file));
        io::copy(layer, &mut writer).map_err(|e| {
            StoreError::GraphError(format!(
                "Failed to store layer for image {}: {}",
                image.id, e
            ))
        })?;
        let (size, checksum) = writer.finish()?;

        std::fs::write(scratch.path().join("layersize"), size.to_string())?;
        std::fs::write(scratch.path().join("checksum"), &checksum)?;

        if let Err(e) = std::fs::rename(scratch.path(), &target) {
            if target.join("json").is_file() {
                return Err(StoreError::ImageExists(image.id.clone()));
            }
            return Err(StoreError::GraphError(format!(
                "Failed to move image {} into place: {}",
                image.id, e
            )));
        }

        tracing::debug!(
            id = %image.id,
            parent = %image.parent,
            size_bytes = size,
            checksum = %checksum,
            "Registered image"
        );

        Ok(())
    }

    fn layer_size(&self, id: &str) -> Result<u64> {
        let dir = self.image_dir(id)?;
        let recorded = read_image_file(&dir.join("layersize"), id)?;
        recorded.trim().parse().map_err(|e| {
            StoreError::GraphError(format!("Invalid layer size for image {}: {}", id, e))
        })
    }
}

fn read_image_file(path: &Path, id: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::ImageNotFound(id.to_string())
        } else {
            StoreError::file(path, e)
        }
    })
}

/// Writer that hashes and counts everything passing through it.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Flush the inner writer and return `(bytes written, "sha256:<hex>")`.
    fn finish(mut self) -> io::Result<(u64, String)> {
        self.inner.flush()?;
        let digest = hex::encode(self.hasher.finalize());
        Ok((self.written, format!("sha256:{}", digest)))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
