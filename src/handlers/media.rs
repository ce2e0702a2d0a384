//! Media Handlers
//!
//! Public endpoint streaming one listing photo from blob storage.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use http::{header, HeaderMap, StatusCode};

use crate::models::ResourceKind;
use crate::services::records::{RecordError, RecordStore};
use crate::services::storage::{BlobStore, StorageError};

/// Content type used when an item does not record one
const DEFAULT_CONTENT_TYPE: &str = "image/webp";

/// Serving error
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Not found")]
    NotFound,
    #[error("Error fetching image: {0}")]
    Internal(String),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound => (StatusCode::NOT_FOUND, "Not found"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Error fetching image"),
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

impl From<RecordError> for ServeError {
    fn from(error: RecordError) -> Self {
        match error {
            RecordError::NotFound(..) => Self::NotFound,
            RecordError::Backend(e) => Self::Internal(e),
        }
    }
}

impl From<StorageError> for ServeError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(_) => Self::NotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Media handler
pub struct MediaHandler {
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn BlobStore>,
    cache_control: String,
}

impl MediaHandler {
    pub fn new(records: Arc<dyn RecordStore>, storage: Arc<dyn BlobStore>) -> Self {
        Self {
            records,
            storage,
            cache_control: "public, max-age=31536000, immutable".to_string(),
        }
    }

    /// Override the Cache-Control value sent with photos
    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = cache_control.into();
        self
    }

    /// Serve one photo of a listing.
    ///
    /// Legacy photo sets have no addressable items, so every lookup on them
    /// is a 404.
    pub async fn serve(
        &self,
        kind: ResourceKind,
        owner_id: &str,
        media_id: &str,
        if_none_match: Option<&str>,
    ) -> Result<Response, ServeError> {
        let images = self.records.load_images(kind, owner_id).await.map_err(|e| {
            if matches!(e, RecordError::Backend(_)) {
                tracing::error!(error = %e, kind = %kind, owner_id = %owner_id, "Failed to load listing photos");
            }
            ServeError::from(e)
        })?;

        let item = images
            .as_ref()
            .and_then(|images| images.find_item(media_id))
            .ok_or(ServeError::NotFound)?;

        let meta = self.storage.head(&item.blob_key).await.map_err(|e| {
            Self::log_storage_error(&e, media_id, &item.blob_key);
            ServeError::from(e)
        })?;
        let etag = meta.e_tag.as_deref().map(quote_etag);

        if let (Some(etag), Some(candidates)) = (etag.as_deref(), if_none_match) {
            if etag_matches(candidates, etag) {
                tracing::debug!(media_id = %media_id, etag = %etag, "Photo not modified");
                return Response::builder()
                    .status(StatusCode::NOT_MODIFIED)
                    .header(header::ETAG, etag)
                    .header(header::CACHE_CONTROL, self.cache_control.as_str())
                    .body(Body::empty())
                    .map_err(|e| ServeError::Internal(e.to_string()));
            }
        }

        let object = self.storage.get(&item.blob_key).await.map_err(|e| {
            Self::log_storage_error(&e, media_id, &item.blob_key);
            ServeError::from(e)
        })?;

        let content_type = if item.mime_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            item.mime_type.as_str()
        };

        tracing::debug!(media_id = %media_id, blob_key = %item.blob_key, "Proxying photo from storage");

        let blob_key = item.blob_key.clone();
        let body_stream = object.stream.map(move |result| {
            result.map_err(|e| {
                tracing::error!(error = %e, blob_key = %blob_key, "Photo stream interrupted");
                std::io::Error::other(format!("Storage stream error: {}", e))
            })
        });

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, object.meta.size)
            .header(header::CACHE_CONTROL, self.cache_control.as_str());
        if let Some(etag) = etag {
            response = response.header(header::ETAG, etag);
        }

        response
            .body(Body::from_stream(body_stream))
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to build response");
                ServeError::Internal(e.to_string())
            })
    }

    /// Router with the serving endpoint for both listing kinds
    pub fn routes(self) -> Router {
        Router::new()
            .route("/api/propiedades/{owner_id}/media/{media_id}", get(serve_property_photo))
            .route("/api/emprendimientos/{owner_id}/media/{media_id}", get(serve_project_photo))
            .with_state(Arc::new(self))
    }

    fn log_storage_error(error: &StorageError, media_id: &str, blob_key: &str) {
        match error {
            StorageError::NotFound(_) => {
                tracing::warn!(media_id = %media_id, blob_key = %blob_key, "Photo blob missing");
            }
            other => {
                tracing::error!(error = %other, media_id = %media_id, blob_key = %blob_key, "Failed to read photo blob");
            }
        }
    }
}

async fn serve_property_photo(
    State(handler): State<Arc<MediaHandler>>,
    Path((owner_id, media_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    let if_none_match = if_none_match(&headers);
    handler
        .serve(ResourceKind::Propiedades, &owner_id, &media_id, if_none_match.as_deref())
        .await
}

async fn serve_project_photo(
    State(handler): State<Arc<MediaHandler>>,
    Path((owner_id, media_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    let if_none_match = if_none_match(&headers);
    handler
        .serve(ResourceKind::Emprendimientos, &owner_id, &media_id, if_none_match.as_deref())
        .await
}

/// All If-None-Match header values joined into one list
fn if_none_match(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

/// Entity tag in quoted form
fn quote_etag(tag: &str) -> String {
    let (weak, opaque) = match tag.strip_prefix("W/") {
        Some(rest) => ("W/", rest),
        None => ("", tag),
    };

    if opaque.len() >= 2 && opaque.starts_with('"') && opaque.ends_with('"') {
        format!("{}{}", weak, opaque)
    } else {
        format!("{}\"{}\"", weak, opaque)
    }
}

/// Weak comparison of an If-None-Match list against an entity tag
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let target = quote_etag(etag.strip_prefix("W/").unwrap_or(etag));

    if_none_match
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .any(|candidate| {
            candidate == "*" || quote_etag(candidate.strip_prefix("W/").unwrap_or(candidate)) == target
        })
}
