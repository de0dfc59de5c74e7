//! imgstore Runtime - image graph, tag index and bundle loader.
//!
//! This crate provides the on-disk image graph, the persistent tag index,
//! the process-wide transfer pool and the loader that ingests image bundles
//! into them.

#![allow(clippy::result_large_err)]

pub mod archive;
pub mod graph;
pub mod loader;
pub mod pool;
pub mod staging;
pub mod store;
pub mod tags;

// Re-export common types
pub use archive::{extract, ExtractOptions};
pub use graph::{FsGraph, ImageGraph};
pub use loader::{plan_excludes, ImageLoader};
pub use pool::{Admission, PoolGuard, PoolKind, PoolStats, TransferPool, Waiter};
pub use staging::StagingArea;
pub use store::ImageStore;
pub use tags::{Repository, TagStore};

/// imgstore Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
