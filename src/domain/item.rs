//! Catalog item snapshot
//!
//! The analysis service returns a full catalog entry for the uploaded
//! photo. The snapshot is cached on the task record so downstream UI can
//! display or edit the item without another network round-trip.

use serde::{Deserialize, Serialize};

/// Reference to an uploaded asset in remote storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef(String);

impl AssetRef {
    /// Wrap a storage reference string
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Get the reference string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog entry produced by analyzing a wardrobe-item photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Server-assigned item ID
    pub id: String,

    /// Display name for the item
    pub name: String,

    /// Garment category (e.g. "tops", "dresses", "shoes")
    pub category: String,

    /// URL of the stored photo
    pub image_url: String,

    /// Open-ended garment attributes (color, season, brand, ...)
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl CatalogItem {
    /// Create an item with empty attributes
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            image_url: image_url.into(),
            attributes: serde_json::Value::Null,
        }
    }

    /// Set the attribute payload
    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = attributes;
        self
    }
}
