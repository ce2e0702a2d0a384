//! Media Service
//!
//! Saves a listing's photo set: validate uploads, process them, merge with
//! the photos being kept and replace the listing's `images` field.

use std::sync::Arc;

use crate::models::{Images, MediaCollection, MediaItem, ResourceKind};
use super::collection::merge_collection;
use super::records::{RecordError, RecordStore};
use super::upload::{Rejection, UploadFile, UploadService};

/// Media service error
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Record error: {0}")]
    Records(#[from] RecordError),
}

/// Edit submitted from the admin form
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    /// Stored items to keep, in their current order. Items left out are removed.
    pub existing: Vec<MediaItem>,
    /// Newly selected files
    pub files: Vec<UploadFile>,
    /// Requested cover media ID
    pub desired_cover_id: Option<String>,
    /// Alt text for new photos
    pub default_alt: Option<String>,
}

/// Result of a save
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// Collection now stored on the listing
    pub collection: MediaCollection,
    /// Files dropped by validation
    pub rejected: Vec<Rejection>,
    /// New files stored as photos
    pub processed: usize,
    /// New files that passed validation but failed processing
    pub failed: usize,
}

/// Media service
pub struct MediaService {
    /// Listing records
    records: Arc<dyn RecordStore>,
    /// Upload pipeline
    uploads: Arc<UploadService>,
}

impl MediaService {
    /// Create a new media service
    pub fn new(records: Arc<dyn RecordStore>, uploads: Arc<UploadService>) -> Self {
        Self { records, uploads }
    }

    /// Current photo set of a listing
    pub async fn load(&self, kind: ResourceKind, owner_id: &str) -> Result<Option<Images>, MediaError> {
        Ok(self.records.load_images(kind, owner_id).await?)
    }

    /// Apply an edit to a listing's photos.
    ///
    /// The listing must exist before any upload is stored. Processing
    /// failures shrink the result instead of failing the save.
    /// The `images` field is replaced as a whole; concurrent edits are not
    /// detected and the last write wins.
    pub async fn save(
        &self,
        kind: ResourceKind,
        owner_id: &str,
        request: SaveRequest,
    ) -> Result<SaveOutcome, MediaError> {
        let SaveRequest {
            existing,
            files,
            desired_cover_id,
            default_alt,
        } = request;

        self.records.load_images(kind, owner_id).await?;

        let batch = self.uploads.validate(kind, existing.len(), files);
        if let Some(warning) = batch.warning() {
            tracing::warn!(kind = %kind, owner_id = %owner_id, "{}", warning);
        }

        let accepted = batch.accepted.len();
        let new_items = self
            .uploads
            .process_uploads(
                kind,
                owner_id,
                batch.accepted,
                existing.len() as i64,
                default_alt.as_deref(),
            )
            .await;

        let processed = new_items.len();
        let failed = accepted - processed;
        if failed > 0 {
            tracing::warn!(
                kind = %kind,
                owner_id = %owner_id,
                failed,
                "Some uploads could not be processed"
            );
        }

        let collection = merge_collection(existing, new_items, desired_cover_id.as_deref());

        self.records
            .store_images(kind, owner_id, Images::Collection(collection.clone()))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, kind = %kind, owner_id = %owner_id, "Failed to store photos");
                e
            })?;

        tracing::info!(
            kind = %kind,
            owner_id = %owner_id,
            items = collection.len(),
            cover_id = ?collection.cover_id,
            "Listing photos saved"
        );

        Ok(SaveOutcome {
            collection,
            rejected: batch.rejected,
            processed,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::image::tests::jpeg_bytes;
    use crate::services::image::ImageService;
    use crate::services::records::MemoryRecordStore;
    use crate::services::storage::ObjectBlobStore;
    use crate::services::upload::RejectReason;
    use futures::StreamExt;
    use object_store::memory::InMemory;
    use object_store::ObjectStore;
    use serde_json::json;

    fn service(records: MemoryRecordStore) -> MediaService {
        service_with_blobs(records, Arc::new(InMemory::new()))
    }

    fn service_with_blobs(records: MemoryRecordStore, blobs: Arc<InMemory>) -> MediaService {
        let uploads = UploadService::new(
            Arc::new(ObjectBlobStore::new(blobs)),
            Arc::new(ImageService::default()),
        );
        MediaService::new(Arc::new(records), Arc::new(uploads))
    }

    fn jpeg(name: &str) -> UploadFile {
        UploadFile::new(name, Some("image/jpeg"), jpeg_bytes(40, 30))
    }

    #[tokio::test]
    async fn test_first_save_on_empty_listing() {
        let records = MemoryRecordStore::new();
        records.insert_empty(ResourceKind::Propiedades, "42").await;
        let service = service(records.clone());

        let outcome = service
            .save(
                ResourceKind::Propiedades,
                "42",
                SaveRequest {
                    files: vec![jpeg("a.jpg"), jpeg("b.jpg")],
                    ..SaveRequest::default()
                },
            )
            .await
            .unwrap();

        let collection = &outcome.collection;
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.items[0].sort_order, Some(0));
        assert_eq!(collection.items[1].sort_order, Some(1));
        assert_eq!(collection.cover_id.as_deref(), Some(collection.items[0].media_id.as_str()));
        assert!(outcome.rejected.is_empty());
        assert_eq!((outcome.processed, outcome.failed), (2, 0));

        let stored = service.load(ResourceKind::Propiedades, "42").await.unwrap();
        assert_eq!(stored, Some(Images::Collection(collection.clone())));
    }

    #[tokio::test]
    async fn test_new_items_continue_sort_order() {
        let records = MemoryRecordStore::new();
        records.insert_empty(ResourceKind::Propiedades, "1").await;
        let service = service(records);

        let first = service
            .save(
                ResourceKind::Propiedades,
                "1",
                SaveRequest {
                    files: vec![jpeg("a.jpg"), jpeg("b.jpg")],
                    ..SaveRequest::default()
                },
            )
            .await
            .unwrap();

        let second = service
            .save(
                ResourceKind::Propiedades,
                "1",
                SaveRequest {
                    existing: first.collection.items.clone(),
                    files: vec![jpeg("c.jpg")],
                    desired_cover_id: first.collection.items.get(1).map(|i| i.media_id.clone()),
                    default_alt: Some("Cocina".to_string()),
                },
            )
            .await
            .unwrap();

        let collection = second.collection;
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.items[2].sort_order, Some(2));
        assert_eq!(collection.items[2].alt.as_deref(), Some("Cocina"));
        assert_eq!(collection.cover_id, Some(collection.items[1].media_id.clone()));
    }

    #[tokio::test]
    async fn test_replaces_legacy_field() {
        let records = MemoryRecordStore::new();
        records
            .insert_raw(ResourceKind::Emprendimientos, "5", json!(["https://cdn.example/a.jpg"]))
            .await;
        let service = service(records.clone());

        service
            .save(
                ResourceKind::Emprendimientos,
                "5",
                SaveRequest {
                    files: vec![jpeg("a.jpg")],
                    ..SaveRequest::default()
                },
            )
            .await
            .unwrap();

        let raw = records.raw(ResourceKind::Emprendimientos, "5").await.unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["items"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_limit_rejections_are_reported() {
        let records = MemoryRecordStore::new();
        records.insert_empty(ResourceKind::Emprendimientos, "9").await;
        let service = service(records);

        let files: Vec<UploadFile> = (0..7).map(|i| jpeg(&format!("{}.jpg", i))).collect();
        let outcome = service
            .save(
                ResourceKind::Emprendimientos,
                "9",
                SaveRequest {
                    files,
                    ..SaveRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.collection.len(), 5);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(outcome
            .rejected
            .iter()
            .all(|r| r.reason == RejectReason::LimitExceeded { max: 5 }));
    }

    #[tokio::test]
    async fn test_missing_listing_is_record_error() {
        let service = service(MemoryRecordStore::new());

        let result = service
            .save(ResourceKind::Propiedades, "404", SaveRequest::default())
            .await;
        assert!(matches!(result, Err(MediaError::Records(RecordError::NotFound(..)))));
    }

    #[tokio::test]
    async fn test_missing_listing_stores_no_blobs() {
        let blobs = Arc::new(InMemory::new());
        let service = service_with_blobs(MemoryRecordStore::new(), Arc::clone(&blobs));

        let result = service
            .save(
                ResourceKind::Propiedades,
                "404",
                SaveRequest {
                    files: vec![jpeg("a.jpg")],
                    ..SaveRequest::default()
                },
            )
            .await;

        assert!(matches!(result, Err(MediaError::Records(RecordError::NotFound(..)))));
        let stored: Vec<_> = blobs.list(None).collect().await;
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_outcome_counts_processing_failures() {
        let records = MemoryRecordStore::new();
        records.insert_empty(ResourceKind::Propiedades, "3").await;
        let service = service(records);

        let files = vec![
            jpeg("ok.jpg"),
            UploadFile::new("broken.jpg", Some("image/jpeg"), b"not really".to_vec()),
        ];
        let outcome = service
            .save(
                ResourceKind::Propiedades,
                "3",
                SaveRequest {
                    files,
                    ..SaveRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.collection.len(), 1);
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.rejected.is_empty());
    }
}
