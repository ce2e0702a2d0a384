//! Record Store
//!
//! Access to the `images` field of listing records. The listing records
//! themselves live in the host's relational store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{Images, ResourceKind};

/// Record store error
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Listing not found: {0}/{1}")]
    NotFound(ResourceKind, String),
    #[error("Record store error: {0}")]
    Backend(String),
}

/// Read and replace the photo field of a listing
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current `images` value. `Ok(None)` when the listing exists without photos.
    async fn load_images(&self, kind: ResourceKind, owner_id: &str)
        -> Result<Option<Images>, RecordError>;

    /// Replace the whole `images` value. Last write wins.
    async fn store_images(
        &self,
        kind: ResourceKind,
        owner_id: &str,
        images: Images,
    ) -> Result<(), RecordError>;
}

/// In-memory record store keyed by listing kind and owner ID
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<(ResourceKind, String), Option<serde_json::Value>>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listing with its raw persisted `images` JSON
    pub async fn insert_raw(&self, kind: ResourceKind, owner_id: &str, images: serde_json::Value) {
        let value = if images.is_null() { None } else { Some(images) };
        let mut records = self.records.write().await;
        records.insert((kind, owner_id.to_string()), value);
    }

    /// Register a listing without photos
    pub async fn insert_empty(&self, kind: ResourceKind, owner_id: &str) {
        self.insert_raw(kind, owner_id, serde_json::Value::Null).await;
    }

    /// Drop a listing record
    pub async fn remove(&self, kind: ResourceKind, owner_id: &str) -> bool {
        let mut records = self.records.write().await;
        records.remove(&(kind, owner_id.to_string())).is_some()
    }

    /// Raw persisted JSON of a listing's `images` field
    pub async fn raw(&self, kind: ResourceKind, owner_id: &str) -> Option<serde_json::Value> {
        let records = self.records.read().await;
        records.get(&(kind, owner_id.to_string())).cloned().flatten()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load_images(
        &self,
        kind: ResourceKind,
        owner_id: &str,
    ) -> Result<Option<Images>, RecordError> {
        let records = self.records.read().await;
        let value = records
            .get(&(kind, owner_id.to_string()))
            .ok_or_else(|| RecordError::NotFound(kind, owner_id.to_string()))?;

        match value {
            None => Ok(None),
            Some(json) => Images::from_json(json).map_err(|e| {
                RecordError::Backend(format!("malformed images field for {}/{}: {}", kind, owner_id, e))
            }),
        }
    }

    async fn store_images(
        &self,
        kind: ResourceKind,
        owner_id: &str,
        images: Images,
    ) -> Result<(), RecordError> {
        let json = serde_json::to_value(&images).map_err(|e| RecordError::Backend(e.to_string()))?;

        let mut records = self.records.write().await;
        let slot = records
            .get_mut(&(kind, owner_id.to_string()))
            .ok_or_else(|| RecordError::NotFound(kind, owner_id.to_string()))?;
        *slot = Some(json);

        Ok(())
    }
}
