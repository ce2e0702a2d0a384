//! Storage Service
//!
//! Blob storage for encoded photos.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload};
use url::Url;

/// Storage error
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Download failed: {0}")]
    DownloadFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of blob bytes
pub type BlobStream = BoxStream<'static, StorageResult<Bytes>>;

/// Blob metadata needed for serving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    /// Byte length
    pub size: u64,
    /// Entity tag as reported by the store, if any
    pub e_tag: Option<String>,
    /// Content type recorded on the stored object
    pub content_type: Option<String>,
}

/// Blob contents with metadata
pub struct BlobObject {
    pub meta: BlobMeta,
    pub stream: BlobStream,
}

impl std::fmt::Debug for BlobObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobObject").field("meta", &self.meta).finish_non_exhaustive()
    }
}

/// Blob store used by the upload pipeline and the serving endpoint
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`, recording content type and cache policy on the object
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<BlobMeta>;

    /// Metadata of an existing blob
    async fn head(&self, key: &str) -> StorageResult<BlobMeta>;

    /// Open a blob for streaming
    async fn get(&self, key: &str) -> StorageResult<BlobObject>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<BlobMeta> {
        (**self).put(key, data, content_type, cache_control).await
    }

    async fn head(&self, key: &str) -> StorageResult<BlobMeta> {
        (**self).head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<BlobObject> {
        (**self).get(key).await
    }
}

/// `BlobStore` backed by any `object_store` implementation
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    /// Prefix taken from the store URL
    prefix: String,
}

impl ObjectBlobStore {
    /// Wrap an existing object store
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            prefix: String::new(),
        }
    }

    /// Process-local store, mainly for tests and development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Build from a store URL such as `memory:///`, `s3://bucket/prefix`
    /// or `az://container`. Backend options (credentials, region) are
    /// passed through unchanged.
    pub fn from_url(url: &str, options: &HashMap<String, String>) -> StorageResult<Self> {
        let parsed = Url::parse(url).map_err(|e| StorageError::Config(format!("{}: {}", url, e)))?;
        let (store, prefix) = object_store::parse_url_opts(&parsed, options)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        tracing::info!(url = %url, prefix = %prefix, "Blob store configured");

        Ok(Self {
            store: Arc::from(store),
            prefix: prefix.to_string(),
        })
    }

    fn location(&self, key: &str) -> Path {
        let key = key.trim_start_matches('/');
        if self.prefix.is_empty() {
            Path::from(key)
        } else {
            Path::from(format!("{}/{}", self.prefix, key))
        }
    }

    fn map_read_error(key: &str, error: object_store::Error) -> StorageError {
        match error {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        }
    }

    fn meta_from(meta: &object_store::ObjectMeta, attributes: Option<&Attributes>) -> BlobMeta {
        BlobMeta {
            size: meta.size as u64,
            e_tag: meta.e_tag.clone(),
            content_type: attributes
                .and_then(|attrs| attrs.get(&Attribute::ContentType))
                .map(|value| AsRef::<str>::as_ref(value).to_string()),
        }
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<BlobMeta> {
        let location = self.location(key);
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, AttributeValue::from(content_type.to_string()));
        attributes.insert(Attribute::CacheControl, AttributeValue::from(cache_control.to_string()));

        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result = self
            .store
            .put_opts(&location, PutPayload::from(data), options)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Blob upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::debug!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob upload successful"
        );

        Ok(BlobMeta {
            size,
            e_tag: result.e_tag,
            content_type: Some(content_type.to_string()),
        })
    }

    async fn head(&self, key: &str) -> StorageResult<BlobMeta> {
        let meta = self
            .store
            .head(&self.location(key))
            .await
            .map_err(|e| Self::map_read_error(key, e))?;

        Ok(Self::meta_from(&meta, None))
    }

    async fn get(&self, key: &str) -> StorageResult<BlobObject> {
        let result = self
            .store
            .get(&self.location(key))
            .await
            .map_err(|e| Self::map_read_error(key, e))?;

        let meta = Self::meta_from(&result.meta, Some(&result.attributes));
        let owned_key = key.to_string();
        let stream = result
            .into_stream()
            .map(move |chunk| {
                chunk.map_err(|e| StorageError::DownloadFailed(format!("{}: {}", owned_key, e)))
            })
            .boxed();

        Ok(BlobObject { meta, stream })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_put_head_and_get() {
        let storage = ObjectBlobStore::in_memory();
        let data = Bytes::from_static(b"webp bytes");

        let stored = storage
            .put("media/propiedades/1/a.webp", data.clone(), "image/webp", "public, max-age=31536000, immutable")
            .await
            .unwrap();
        assert_eq!(stored.size, data.len() as u64);

        let meta = storage.head("media/propiedades/1/a.webp").await.unwrap();
        assert_eq!(meta.size, data.len() as u64);
        assert!(meta.e_tag.is_some());

        let object = storage.get("media/propiedades/1/a.webp").await.unwrap();
        assert_eq!(object.meta.content_type.as_deref(), Some("image/webp"));
        let chunks: Vec<Bytes> = object.stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), data.to_vec());
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let storage = ObjectBlobStore::in_memory();
        assert!(matches!(
            storage.head("media/none.webp").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.get("media/none.webp").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_etag_changes_on_overwrite() {
        let storage = ObjectBlobStore::in_memory();
        let first = storage.put("k", Bytes::from_static(b"one"), "image/webp", "no-cache").await.unwrap();
        let second = storage.put("k", Bytes::from_static(b"two"), "image/webp", "no-cache").await.unwrap();
        assert_ne!(first.e_tag, second.e_tag);
    }

    #[test]
    fn test_from_url_memory() {
        let storage = ObjectBlobStore::from_url("memory:///", &HashMap::new()).unwrap();
        assert_eq!(storage.location("a/b.webp").as_ref(), "a/b.webp");
    }

    #[test]
    fn test_from_url_rejects_garbage() {
        assert!(matches!(
            ObjectBlobStore::from_url("not a url", &HashMap::new()),
            Err(StorageError::Config(_))
        ));
    }
}
