//! PropMedia Plugin Entry Point

use std::sync::Arc;

use axum::Router;

use crate::handlers::MediaHandler;
use crate::models::{derive_cover_source, derive_display_order, GalleryEntry, ResourceKind};
use crate::services::media::{MediaError, SaveOutcome, SaveRequest};
use crate::services::records::RecordStore;
use crate::services::storage::{BlobStore, ObjectBlobStore, StorageError};
use crate::services::upload::UploadSettings;
use crate::services::{ImageService, MediaService, UploadService};
use crate::settings::MediaSettings;

/// Plugin setup error
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Invalid settings: {}", .0.join("; "))]
    InvalidSettings(Vec<String>),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// PropMedia Plugin
pub struct PropMediaPlugin {
    /// Plugin settings
    settings: MediaSettings,

    /// Collaborators
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn BlobStore>,

    /// Services
    image_service: Arc<ImageService>,
    upload_service: Arc<UploadService>,
    media_service: Arc<MediaService>,
}

impl PropMediaPlugin {
    /// Create with default settings and an in-memory blob store
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self::with_storage(
            MediaSettings::default(),
            records,
            Arc::new(ObjectBlobStore::in_memory()),
        )
    }

    /// Create from settings, opening the blob store they name
    pub fn with_settings(
        settings: MediaSettings,
        records: Arc<dyn RecordStore>,
    ) -> Result<Self, PluginError> {
        settings.validate().map_err(PluginError::InvalidSettings)?;
        let storage = ObjectBlobStore::from_url(&settings.storage_url, &settings.storage_options)?;
        Ok(Self::with_storage(settings, records, Arc::new(storage)))
    }

    /// Create with an already configured blob store
    pub fn with_storage(
        settings: MediaSettings,
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn BlobStore>,
    ) -> Self {
        // Create services
        let image_service = Arc::new(ImageService::new(settings.max_dimension, settings.webp_quality));
        let mut upload_service = UploadService::new(Arc::clone(&storage), Arc::clone(&image_service));
        upload_service.configure(UploadSettings::from(&settings));
        let upload_service = Arc::new(upload_service);
        let media_service = Arc::new(MediaService::new(
            Arc::clone(&records),
            Arc::clone(&upload_service),
        ));

        tracing::info!(
            storage_url = %settings.storage_url,
            blob_root = %settings.blob_root,
            upload_concurrency = settings.upload_concurrency,
            "PropMedia initialized"
        );

        Self {
            settings,
            records,
            storage,
            image_service,
            upload_service,
            media_service,
        }
    }

    /// Get plugin name
    pub fn name(&self) -> &'static str {
        "PropMedia"
    }

    /// Get plugin version
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Get plugin description
    pub fn description(&self) -> &'static str {
        "Listing photo management for RustPress"
    }

    pub fn settings(&self) -> &MediaSettings {
        &self.settings
    }

    // Service accessors
    pub fn image_service(&self) -> &Arc<ImageService> {
        &self.image_service
    }

    pub fn upload_service(&self) -> &Arc<UploadService> {
        &self.upload_service
    }

    pub fn media_service(&self) -> &Arc<MediaService> {
        &self.media_service
    }

    /// Serving endpoint routes, ready to merge into the host router
    pub fn router(&self) -> Router {
        MediaHandler::new(Arc::clone(&self.records), Arc::clone(&self.storage))
            .with_cache_control(self.settings.cache_control.clone())
            .routes()
    }

    // Convenience methods

    /// Apply an admin edit to a listing's photos
    pub async fn save_media(
        &self,
        kind: ResourceKind,
        owner_id: &str,
        request: SaveRequest,
    ) -> Result<SaveOutcome, MediaError> {
        self.media_service.save(kind, owner_id, request).await
    }

    /// Cover image reference for a listing page
    pub async fn cover_source(&self, kind: ResourceKind, owner_id: &str) -> Result<String, MediaError> {
        let images = self.media_service.load(kind, owner_id).await?;
        Ok(derive_cover_source(kind, owner_id, images.as_ref()))
    }

    /// Gallery entries for a listing page
    pub async fn gallery(&self, kind: ResourceKind, owner_id: &str) -> Result<Vec<GalleryEntry>, MediaError> {
        let images = self.media_service.load(kind, owner_id).await?;
        Ok(derive_display_order(kind, owner_id, images.as_ref()))
    }
}

/// Plugin metadata for registration
pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: "PropMedia",
        version: env!("CARGO_PKG_VERSION"),
        description: "Listing photo management for RustPress",
        author: "RustPress Team",
        license: "MIT",
        routes: vec![
            "/api/propiedades/{owner_id}/media/{media_id}",
            "/api/emprendimientos/{owner_id}/media/{media_id}",
        ],
    }
}

/// Plugin information
#[derive(Debug)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub author: &'static str,
    pub license: &'static str,
    pub routes: Vec<&'static str>,
}
