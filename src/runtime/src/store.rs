//! ImageStore: the graph, the tag index and the transfer pool behind one
//! handle.

use std::io::Write;
use std::sync::Arc;

use imgstore_core::config::StoreConfig;
use imgstore_core::error::{Result, StoreError};
use imgstore_core::image::ImageMetadata;
use imgstore_core::reference::{
    parse_repository_tag, validate_repository_name, validate_tag_name, DEFAULT_TAG,
};

use crate::graph::{FsGraph, ImageGraph};
use crate::pool::TransferPool;
use crate::tags::TagStore;

/// Content-addressed image store.
pub struct ImageStore {
    graph: Arc<dyn ImageGraph>,
    tags: TagStore,
    pool: TransferPool,
    config: StoreConfig,
}

impl ImageStore {
    /// Open the store described by `config`, creating directories as needed.
    pub fn open(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root).map_err(|e| StoreError::file(&config.root, e))?;

        let graph = FsGraph::new(&config.graph_dir())?;
        let tags = TagStore::open(config.repositories_path())?;

        tracing::debug!(root = %config.root.display(), "Opened image store");

        Ok(Self::from_parts(
            Arc::new(graph),
            tags,
            TransferPool::new(),
            config,
        ))
    }

    /// Assemble a store from existing parts.
    pub fn from_parts(
        graph: Arc<dyn ImageGraph>,
        tags: TagStore,
        pool: TransferPool,
        config: StoreConfig,
    ) -> Self {
        Self {
            graph,
            tags,
            pool,
            config,
        }
    }

    pub fn graph(&self) -> &dyn ImageGraph {
        self.graph.as_ref()
    }

    /// Owned handle on the graph, for work moved off the calling task.
    pub fn shared_graph(&self) -> Arc<dyn ImageGraph> {
        Arc::clone(&self.graph)
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn pool(&self) -> &TransferPool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Resolve `name` to a registered image.
    ///
    /// `name` is tried as `repo[:tag]` against the tag index first (missing
    /// tag means `latest`), then as an image ID.
    pub fn lookup_image(&self, name: &str) -> Result<ImageMetadata> {
        let (repo, tag) = parse_repository_tag(name);
        let tag = if tag.is_empty() {
            DEFAULT_TAG.to_string()
        } else {
            tag
        };

        if let Some(id) = self.tags.get(&repo, &tag) {
            return self.graph.get(&id);
        }

        if self.graph.exists(name) {
            return self.graph.get(name);
        }

        Err(StoreError::ImageNotFound(name.to_string()))
    }

    /// Bind `repo:tag` to the image named by `image`.
    ///
    /// With `force`, a tag already bound to another image is moved and a
    /// notice naming the old image is written to `progress`.
    pub fn set_load(
        &self,
        repo: &str,
        tag: &str,
        image: &str,
        force: bool,
        progress: &mut dyn Write,
    ) -> Result<()> {
        let tag = if tag.is_empty() { DEFAULT_TAG } else { tag };
        validate_repository_name(repo)?;
        validate_tag_name(tag)?;

        let target = self.lookup_image(image)?;
        let replaced = self.tags.set(repo, tag, &target.id, force)?;

        if let Some(old) = replaced {
            writeln!(
                progress,
                "The image {}:{} already exists, renaming the old one with ID {} to empty string",
                repo, tag, old
            )?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStore")
            .field("root", &self.config.root)
            .field("pool", &self.pool)
            .finish()
    }
}
