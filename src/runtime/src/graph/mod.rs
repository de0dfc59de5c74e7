//! Content-addressed image graph.
//!
//! The graph maps image IDs to their metadata and layer. Images reference
//! their parent by ID, so the graph as a whole is a forest whose edges point
//! from child to parent.

mod fs;

pub use fs::FsGraph;

use std::collections::HashMap;
use std::io::Read;

use imgstore_core::error::Result;
use imgstore_core::image::ImageMetadata;

/// Storage contract the loader relies on.
///
/// Implementations must tolerate concurrent `register` calls for distinct
/// IDs and `exists` running concurrently with `register`. Same-ID exclusion
/// is provided by the caller through the transfer pool.
pub trait ImageGraph: Send + Sync {
    /// Whether an image with this ID is registered.
    fn exists(&self, id: &str) -> bool;

    /// Fetch the metadata of a registered image.
    fn get(&self, id: &str) -> Result<ImageMetadata>;

    /// Enumerate all registered images.
    fn map(&self) -> Result<HashMap<String, ImageMetadata>>;

    /// Persist an image and its layer. Once this returns `Ok`, the image is
    /// visible to `exists`, `get` and `map`.
    fn register(&self, image: &ImageMetadata, layer: &mut dyn Read) -> Result<()>;

    /// Size in bytes of the stored layer.
    fn layer_size(&self, id: &str) -> Result<u64>;
}
