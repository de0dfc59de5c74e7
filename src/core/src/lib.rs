//! imgstore Core - Foundational Types and Abstractions
//!
//! This module provides the error type, configuration, image metadata and
//! reference helpers shared by the runtime and the CLI.

pub mod config;
pub mod error;
pub mod image;
pub mod reference;

// Re-export commonly used types
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use image::{validate_id, ImageMetadata};
pub use reference::{parse_repository_tag, DEFAULT_TAG};

/// imgstore version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
