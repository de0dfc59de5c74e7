//! Image bundle loader.
//!
//! A bundle is an uncompressed tar stream holding one directory per image
//! (`<id>/json`, `<id>/layer.tar`) and an optional `repositories` index
//! mapping repository names to `tag → id`. Loading a bundle:
//!
//! 1. extracts it into a private staging area, skipping images the graph
//!    already holds;
//! 2. registers every staged image parent-first, coordinating through the
//!    transfer pool so concurrent loads never ingest the same layer twice;
//! 3. binds the tags from the index.
//!
//! The staging area is removed however the load ends.

mod exclude;

pub use exclude::plan_excludes;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use imgstore_core::error::{Result, StoreError};
use imgstore_core::image::{validate_id, ImageMetadata};

use crate::archive::{self, ExtractOptions};
use crate::pool::{Admission, PoolKind};
use crate::staging::StagingArea;
use crate::store::ImageStore;
use crate::tags::Repository;

/// Loads image bundles into an [`ImageStore`].
#[derive(Debug, Clone)]
pub struct ImageLoader {
    store: Arc<ImageStore>,
}

impl ImageLoader {
    pub fn new(store: Arc<ImageStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Load the bundle read from `input`.
    ///
    /// Tag notices are written to `progress`. The first error aborts the
    /// load; images registered before it stay in the graph. Extraction and
    /// layer ingestion run on the blocking thread pool.
    pub async fn load<R: Read + Send + 'static>(
        &self,
        input: R,
        progress: &mut (dyn Write + Send),
    ) -> Result<()> {
        let staging = StagingArea::new(self.store.config().tmp_dir.as_deref())?;

        let excludes = plan_excludes(self.store.graph())?;
        tracing::debug!(
            staging = %staging.path().display(),
            excluded = excludes.len(),
            "Extracting image bundle"
        );
        let repo_dir = staging.repo_dir().to_path_buf();
        let options = ExtractOptions::excluding(excludes);
        blocking("Bundle extraction", move || {
            archive::extract(input, &repo_dir, &options)
        })
        .await?;

        let addresses = staging.image_dirs()?;
        for address in &addresses {
            self.recursive_load(address, &staging).await?;
        }

        let tags = self.bind_tags(&staging, progress)?;

        tracing::info!(images = addresses.len(), tags, "Loaded image bundle");
        Ok(())
    }

    /// Register the staged image at `address`, and any missing ancestors
    /// before it.
    fn recursive_load<'a>(
        &'a self,
        address: &'a str,
        staging: &'a StagingArea,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if self.store.lookup_image(address).is_ok() {
                tracing::debug!(address, "Image already present");
                return Ok(());
            }

            tracing::debug!(address, "Loading image");
            let dir = staging.image_dir(address);
            let (image, layer) = blocking("Staged image read", move || read_staged(&dir)).await?;

            validate_id(&image.id)?;
            if image.id != address {
                return Err(StoreError::IdMismatch {
                    address: address.to_string(),
                    id: image.id,
                });
            }

            let key = format!("layer:{}", image.id);
            let guard = match self.store.pool().admit(PoolKind::Pull, &key) {
                Admission::Admitted(guard) => guard,
                Admission::InFlight(waiter) => {
                    tracing::debug!(id = %image.id, "Image load already in progress, waiting");
                    waiter.wait().await;
                    return Ok(());
                }
                Admission::Failed(e) => return Err(e),
            };

            // Another load may have finished this image after the lookup above.
            if self.store.graph().exists(&image.id) {
                tracing::debug!(id = %image.id, "Image registered concurrently");
                return Ok(());
            }

            if !image.is_root() && !self.store.graph().exists(&image.parent) {
                self.recursive_load(&image.parent, staging).await?;
            }

            let id = image.id.clone();
            let graph = self.store.shared_graph();
            blocking("Layer registration", move || {
                let mut layer = layer;
                graph.register(&image, &mut layer)
            })
            .await?;
            guard.release();

            tracing::debug!(id = %id, "Completed processing image");
            Ok(())
        }
        .boxed()
    }

    /// Bind every tag of the staged `repositories` index. Returns the number
    /// of tags bound; a bundle without an index binds none.
    fn bind_tags(&self, staging: &StagingArea, progress: &mut dyn Write) -> Result<usize> {
        let path = staging.repositories_path();
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Bundle has no repositories index");
                return Ok(0);
            }
            Err(e) => return Err(StoreError::file(&path, e)),
        };

        let repositories: BTreeMap<String, Repository> = serde_json::from_slice(&data)
            .map_err(|e| {
                StoreError::SerializationError(format!(
                    "Failed to parse repositories index: {}",
                    e
                ))
            })?;

        let mut bound = 0;
        for (repo, tags) in &repositories {
            for (tag, id) in tags {
                self.store.set_load(repo, tag, id, true, progress)?;
                writeln!(progress, "Loaded image: {}:{}", repo, tag)?;
                bound += 1;
            }
        }

        Ok(bound)
    }
}

/// Metadata and opened layer of one staged image directory.
fn read_staged(dir: &Path) -> Result<(ImageMetadata, File)> {
    let json_path = dir.join("json");
    let data = std::fs::read(&json_path).map_err(|e| StoreError::file(&json_path, e))?;
    let image = ImageMetadata::from_json(&data)?;

    let layer_path = dir.join("layer.tar");
    let layer = File::open(&layer_path).map_err(|e| StoreError::file(&layer_path, e))?;

    Ok((image, layer))
}

/// Run blocking filesystem work off the async workers.
async fn blocking<T, F>(task: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Other(format!("{} task failed: {}", task, e)))?
}
