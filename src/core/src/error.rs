use std::path::PathBuf;

use thiserror::Error;

/// imgstore error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// I/O error on a known file or directory
    #[error("Failed to access {}: {source}", .path.display())]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Image identifier failed validation
    #[error("image ID '{0}' is invalid")]
    InvalidImageId(String),

    /// Image is not present in the graph
    #[error("No such image: {0}")]
    ImageNotFound(String),

    /// Image is already registered in the graph
    #[error("Image {0} already exists")]
    ImageExists(String),

    /// Registration attempted before the parent image was present
    #[error("Cannot register image {id}: parent {parent} is not in the graph")]
    ParentMissing { id: String, parent: String },

    /// Staged directory name disagrees with the ID embedded in its metadata
    #[error("Image directory {address} contains metadata for image {id}")]
    IdMismatch { address: String, id: String },

    /// Graph store error
    #[error("Graph error: {0}")]
    GraphError(String),

    /// Archive extraction error
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// Single-flight coordination error
    #[error("Coordination error: {0}")]
    Coordination(String),

    /// Tag already bound to a different image
    #[error("Conflict: Tag {reference} is already set to image {id}, if you want to replace it, please use -f option")]
    TagConflict { reference: String, id: String },

    /// Invalid repository name or tag
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// I/O failure on `path`.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::FileError {
            path: path.into(),
            source,
        }
    }

    /// Kind of the underlying I/O error, if this is one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            StoreError::IoError(e) | StoreError::FileError { source: e, .. } => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(err: serde_yaml::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}

/// Result type alias for imgstore operations
pub type Result<T> = std::result::Result<T, StoreError>;
