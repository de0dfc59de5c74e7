//! Image metadata records and identifier validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Length of a valid image identifier in hex characters.
pub const ID_LENGTH: usize = 64;

/// Metadata for a single image, as stored in its `json` file.
///
/// Only the fields the store reasons about are typed. Everything else the
/// producer wrote (container config, docker version, ...) is kept in `extra`
/// and written back unchanged on registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Content-derived identifier
    pub id: String,

    /// Identifier of the image this one derives from, empty for roots
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,

    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Layer size as reported by the producer
    #[serde(rename = "Size", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    /// Attributes passed through to the graph untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageMetadata {
    /// Create a minimal record with the given ID and parent.
    pub fn new(id: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: parent.into(),
            created: None,
            comment: None,
            author: None,
            architecture: None,
            os: None,
            size: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Decode a metadata record from its JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse image JSON: {}", e))
        })
    }

    /// Encode the record as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Whether this image is the root of its lineage.
    pub fn is_root(&self) -> bool {
        self.parent.is_empty()
    }
}

/// Check that `id` is a well-formed image identifier (64 lowercase hex chars).
pub fn validate_id(id: &str) -> Result<()> {
    let valid = id.len() == ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !valid {
        return Err(StoreError::InvalidImageId(id.to_string()));
    }
    Ok(())
}

/// Truncate an identifier to its 12-character display form.
pub fn truncate_id(id: &str) -> &str {
    if id.len() > 12 {
        &id[..12]
    } else {
        id
    }
}
