//! Upload Service
//!
//! Validates uploaded photos and runs them through the processing pipeline:
//! decode, orient, resize, re-encode, upload.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use uuid::Uuid;

use crate::models::{ImageFormat, MediaItem, ResourceKind};
use crate::settings::MediaSettings;
use super::image::{ImageError, ImageService};
use super::storage::{BlobStore, StorageError};

/// Upload service error
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Processing task failed: {0}")]
    Task(String),
}

/// One file from an upload form
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original filename
    pub filename: String,
    /// Declared content type, if the client sent one
    pub content_type: Option<String>,
    /// Raw bytes
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.map(str::to_string),
            data: data.into(),
        }
    }

    /// MIME type used for validation: declared type, then a guess from the
    /// filename, then the content itself.
    pub fn effective_mime_type(&self) -> String {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .filter(|m| *m != mime::APPLICATION_OCTET_STREAM);
        if let Some(m) = declared {
            return m.essence_str().to_lowercase();
        }

        if let Some(guess) = mime_guess::from_path(&self.filename).first() {
            return guess.essence_str().to_lowercase();
        }

        if let Some(kind) = infer::get(&self.data) {
            return kind.mime_type().to_string();
        }

        mime::APPLICATION_OCTET_STREAM.to_string()
    }
}

/// Why a file was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// MIME type outside the allow-list
    UnsupportedType(String),
    /// Allowed type this build has no decoder for
    DecoderUnavailable(String),
    /// Listing already holds the maximum number of photos
    LimitExceeded { max: usize },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedType(mime) => write!(f, "unsupported file type {}", mime),
            Self::DecoderUnavailable(mime) => write!(f, "{} photos cannot be processed", mime),
            Self::LimitExceeded { max } => write!(f, "limit of {} photos reached", max),
        }
    }
}

/// A file dropped during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub filename: String,
    pub reason: RejectReason,
}

/// Outcome of validating an upload batch
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    /// Files to process, in input order
    pub accepted: Vec<UploadFile>,
    /// Files dropped, in input order
    pub rejected: Vec<Rejection>,
}

impl ValidatedBatch {
    /// User-facing summary of dropped files
    pub fn warning(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }

        let details: Vec<String> = self
            .rejected
            .iter()
            .map(|r| format!("{} ({})", r.filename, r.reason))
            .collect();
        Some(format!("Some files were not uploaded: {}", details.join(", ")))
    }
}

/// Upload settings
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Allowed MIME types
    pub allowed_types: Vec<String>,
    /// Maximum photos per listing
    pub max_items: HashMap<ResourceKind, usize>,
    /// Root prefix for blob keys
    pub blob_root: String,
    /// Cache-Control stored on uploaded blobs
    pub cache_control: String,
    /// Files processed at once
    pub concurrency: usize,
}

impl UploadSettings {
    /// Photo limit for a listing kind
    pub fn max_items(&self, kind: ResourceKind) -> usize {
        self.max_items.get(&kind).copied().unwrap_or(0)
    }
}

impl From<&MediaSettings> for UploadSettings {
    fn from(settings: &MediaSettings) -> Self {
        Self {
            allowed_types: settings.allowed_mime_types.clone(),
            max_items: ResourceKind::ALL
                .iter()
                .map(|kind| (*kind, settings.max_items(*kind)))
                .collect(),
            blob_root: settings.blob_root.clone(),
            cache_control: settings.cache_control.clone(),
            concurrency: settings.upload_concurrency,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from(&MediaSettings::default())
    }
}

/// Upload service
pub struct UploadService {
    /// Blob storage
    storage: Arc<dyn BlobStore>,
    /// Image service
    image_service: Arc<ImageService>,
    /// Settings
    settings: UploadSettings,
}

impl UploadService {
    /// Create a new upload service
    pub fn new(storage: Arc<dyn BlobStore>, image_service: Arc<ImageService>) -> Self {
        Self {
            storage,
            image_service,
            settings: UploadSettings::default(),
        }
    }

    /// Configure settings
    pub fn configure(&mut self, settings: UploadSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Check MIME types and the per-listing photo limit.
    ///
    /// Disallowed files and files no decoder is built for are rejected; once
    /// the limit is reached the remaining allowed files are dropped as well.
    pub fn validate(
        &self,
        kind: ResourceKind,
        existing_count: usize,
        files: Vec<UploadFile>,
    ) -> ValidatedBatch {
        let max = self.settings.max_items(kind);
        let mut remaining = max.saturating_sub(existing_count);
        let mut batch = ValidatedBatch::default();

        for file in files {
            let mime_type = file.effective_mime_type();
            if !self.is_type_allowed(&mime_type) {
                batch.rejected.push(Rejection {
                    filename: file.filename,
                    reason: RejectReason::UnsupportedType(mime_type),
                });
                continue;
            }

            if !ImageService::can_decode(&mime_type) {
                batch.rejected.push(Rejection {
                    filename: file.filename,
                    reason: RejectReason::DecoderUnavailable(mime_type),
                });
                continue;
            }

            if remaining == 0 {
                batch.rejected.push(Rejection {
                    filename: file.filename,
                    reason: RejectReason::LimitExceeded { max },
                });
                continue;
            }

            remaining -= 1;
            batch.accepted.push(file);
        }

        if !batch.rejected.is_empty() {
            tracing::info!(
                kind = %kind,
                accepted = batch.accepted.len(),
                rejected = batch.rejected.len(),
                "Upload batch partially rejected"
            );
        }

        batch
    }

    /// Whether a MIME type is in the allow-list
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.settings
            .allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(mime_type))
    }

    /// Process a batch of uploads into stored media items.
    ///
    /// A file that fails to decode, encode or upload is logged and skipped.
    /// Sort orders follow input position starting at `start_sort_index`,
    /// whatever order the files finish in.
    pub async fn process_uploads(
        &self,
        kind: ResourceKind,
        owner_id: &str,
        files: Vec<UploadFile>,
        start_sort_index: i64,
        default_alt: Option<&str>,
    ) -> Vec<MediaItem> {
        let total = files.len();
        let concurrency = self.settings.concurrency.max(1);

        let results: Vec<Option<MediaItem>> = futures::stream::iter(files.into_iter().enumerate())
            .map(|(index, file)| {
                let sort_order = start_sort_index + index as i64;
                async move {
                    match self.process_one(kind, owner_id, &file, sort_order, default_alt).await {
                        Ok(item) => Some(item),
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                kind = %kind,
                                owner_id = %owner_id,
                                filename = %file.filename,
                                "Skipping upload that failed processing"
                            );
                            None
                        }
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let items: Vec<MediaItem> = results.into_iter().flatten().collect();

        tracing::info!(
            kind = %kind,
            owner_id = %owner_id,
            processed = items.len(),
            failed = total - items.len(),
            "Upload batch processed"
        );

        items
    }

    async fn process_one(
        &self,
        kind: ResourceKind,
        owner_id: &str,
        file: &UploadFile,
        sort_order: i64,
        default_alt: Option<&str>,
    ) -> Result<MediaItem, UploadError> {
        tracing::debug!(
            filename = %file.filename,
            source_format = ?ImageFormat::from_mime(&file.effective_mime_type()),
            size_bytes = file.data.len(),
            "Processing upload"
        );

        let image_service = Arc::clone(&self.image_service);
        let data = file.data.clone();
        let encoded = tokio::task::spawn_blocking(move || image_service.normalize(&data))
            .await
            .map_err(|e| UploadError::Task(e.to_string()))??;

        let format = encoded.format;
        let dimensions = encoded.dimensions;
        let size = encoded.size();
        let blob_key = self.blob_key(kind, owner_id, Uuid::new_v4(), format);

        self.storage
            .put(
                &blob_key,
                Bytes::from(encoded.data),
                format.mime_type(),
                &self.settings.cache_control,
            )
            .await?;

        let mut item = MediaItem::new(blob_key, format.mime_type());
        item.width = dimensions.width;
        item.height = dimensions.height;
        item.size_bytes = size;
        item.alt = default_alt.map(str::to_string);
        item.sort_order = Some(sort_order);
        item.created_at = Some(Utc::now());

        tracing::debug!(
            media_id = %item.media_id,
            blob_key = %item.blob_key,
            width = item.width,
            height = item.height,
            size_bytes = item.size_bytes,
            "Stored processed upload"
        );

        Ok(item)
    }

    /// Blob key for a new asset: `{root}/{kind}/{owner}/{asset}.{ext}`
    fn blob_key(&self, kind: ResourceKind, owner_id: &str, asset_id: Uuid, format: ImageFormat) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            self.settings.blob_root.trim_matches('/'),
            kind.as_str(),
            sanitize_segment(owner_id),
            asset_id,
            format.extension()
        )
    }
}

/// Make an owner ID safe to use as a single key segment
fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
