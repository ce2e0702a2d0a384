//! PropMedia - Listing Photo Management Plugin for RustPress
//!
//! PropMedia manages the photos attached to property ("propiedades") and
//! project ("emprendimientos") listings:
//!
//! - **Photo Sets**: Legacy URL lists and versioned collections with a cover
//! - **Display Helpers**: Gallery order and cover image for public pages
//! - **Upload Pipeline**: Orient, resize and re-encode uploads as WebP
//! - **Blob Storage**: Any `object_store` backend (memory, S3, Azure)
//! - **Serving**: Cacheable photo endpoint with ETag revalidation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use propmedia::{MemoryRecordStore, PropMediaPlugin, ResourceKind, SaveRequest, UploadFile};
//!
//! #[tokio::main]
//! async fn main() {
//!     let records = MemoryRecordStore::new();
//!     records.insert_empty(ResourceKind::Propiedades, "42").await;
//!
//!     let plugin = PropMediaPlugin::new(Arc::new(records));
//!
//!     let data = std::fs::read("frente.jpg").unwrap();
//!     let request = SaveRequest {
//!         files: vec![UploadFile::new("frente.jpg", Some("image/jpeg"), data)],
//!         ..SaveRequest::default()
//!     };
//!     let outcome = plugin.save_media(ResourceKind::Propiedades, "42", request).await.unwrap();
//!     println!("Stored {} photos", outcome.collection.len());
//!
//!     let app = plugin.router();
//!     // serve `app` with axum
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use propmedia::{MediaSettings, PropMediaPlugin};
//!
//! let mut settings = MediaSettings::default();
//! settings.storage_url = "s3://listing-photos/media".to_string();
//! settings.upload_concurrency = 4;
//!
//! let plugin = PropMediaPlugin::with_settings(settings, records)?;
//! ```

pub mod models;
pub mod services;
pub mod handlers;
pub mod settings;
pub mod plugin;

// Re-exports
pub use models::{
    Images, MediaCollection, MediaItem, ResourceKind, GalleryEntry,
    ImageDimensions, ImageFormat, Orientation,
    derive_cover_source, derive_display_order, media_url, PLACEHOLDER_IMAGE,
};

pub use services::{
    merge_collection, BlobStore, ImageService, MediaService, MemoryRecordStore,
    ObjectBlobStore, RecordStore, UploadService,
};
pub use services::media::{MediaError, SaveOutcome, SaveRequest};
pub use services::upload::{RejectReason, Rejection, UploadFile, ValidatedBatch};

pub use handlers::{MediaHandler, ServeError};

pub use settings::MediaSettings;
pub use plugin::{PropMediaPlugin, PluginError, PluginInfo, plugin_info};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
