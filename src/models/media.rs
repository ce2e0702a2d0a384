//! Media Models
//!
//! Photo sets attached to listing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current structured collection format
pub const COLLECTION_VERSION: u32 = 1;

/// Listing kind owning a photo set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Property listings
    Propiedades,
    /// Development projects
    Emprendimientos,
}

impl ResourceKind {
    /// All listing kinds
    pub const ALL: [ResourceKind; 2] = [Self::Propiedades, Self::Emprendimientos];

    /// Path segment used in URLs and blob keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Propiedades => "propiedades",
            Self::Emprendimientos => "emprendimientos",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "propiedades" => Ok(Self::Propiedades),
            "emprendimientos" => Ok(Self::Emprendimientos),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}

/// One stored photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Public identifier
    pub media_id: String,
    /// Location inside the blob store. Never leaves the server.
    pub blob_key: String,
    /// Format of the stored bytes
    #[serde(default)]
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Stored size in bytes
    pub size_bytes: u64,
    /// Alt text
    #[serde(default)]
    pub alt: Option<String>,
    /// Lower sorts first among non-cover items
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MediaItem {
    /// Create an item with a fresh media ID
    pub fn new(blob_key: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            media_id: Uuid::new_v4().to_string(),
            blob_key: blob_key.into(),
            mime_type: mime_type.into(),
            width: 0,
            height: 0,
            size_bytes: 0,
            alt: None,
            sort_order: None,
            created_at: None,
        }
    }

    /// Sort order, missing treated as zero
    pub fn effective_sort_order(&self) -> i64 {
        self.sort_order.unwrap_or(0)
    }

    /// Creation time, missing treated as the Unix epoch
    pub fn effective_created_at(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Versioned, structured photo set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCollection {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Media ID of the cover photo
    #[serde(default)]
    pub cover_id: Option<String>,
    /// Stored order is not display order
    pub items: Vec<MediaItem>,
}

fn default_version() -> u32 {
    COLLECTION_VERSION
}

impl MediaCollection {
    /// Collection with no items and no cover
    pub fn empty() -> Self {
        Self {
            version: COLLECTION_VERSION,
            cover_id: None,
            items: Vec::new(),
        }
    }

    /// Find an item by media ID
    pub fn find(&self, media_id: &str) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.media_id == media_id)
    }

    /// Cover ID if it references an item in the collection
    pub fn valid_cover_id(&self) -> Option<&str> {
        self.cover_id
            .as_deref()
            .filter(|id| self.find(id).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl Default for MediaCollection {
    fn default() -> Self {
        Self::empty()
    }
}

/// Photo set stored on a listing record.
///
/// The persisted JSON is either a bare array of URLs (legacy) or an object
/// carrying `items`. The shape is resolved once on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Images {
    /// Flat list of absolute URLs; first one is the cover. Read-only.
    Legacy(Vec<String>),
    /// Structured collection
    Collection(MediaCollection),
}

impl Images {
    /// Parse the persisted JSON field. `null` yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Self>, serde_json::Error> {
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value.clone()).map(Some)
    }

    /// Structured items; legacy URLs carry none
    pub fn items(&self) -> &[MediaItem] {
        match self {
            Self::Legacy(_) => &[],
            Self::Collection(collection) => &collection.items,
        }
    }

    /// Look up a structured item by media ID
    pub fn find_item(&self, media_id: &str) -> Option<&MediaItem> {
        match self {
            Self::Legacy(_) => None,
            Self::Collection(collection) => collection.find(media_id),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

impl From<MediaCollection> for Images {
    fn from(collection: MediaCollection) -> Self {
        Self::Collection(collection)
    }
}
