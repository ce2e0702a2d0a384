//! PropMedia Settings

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::ResourceKind;

/// Settings file error
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Media subsystem settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    // Storage
    /// Blob store URL (memory:///, s3://bucket/prefix, az://container)
    pub storage_url: String,
    /// Backend options passed to the blob store (credentials, region, endpoint)
    pub storage_options: HashMap<String, String>,
    /// Root prefix for blob keys
    pub blob_root: String,
    /// Cache-Control stored on blobs and sent when serving
    pub cache_control: String,

    // Upload limits
    /// Allowed MIME types
    pub allowed_mime_types: Vec<String>,
    /// Maximum photos per property
    pub max_property_images: usize,
    /// Maximum photos per project
    pub max_project_images: usize,
    /// Files processed at once during an upload
    pub upload_concurrency: usize,

    // Image processing
    /// Longest side of stored photos in pixels
    pub max_dimension: u32,
    /// WebP quality (1-100)
    pub webp_quality: u8,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            // Storage
            storage_url: "memory:///".to_string(),
            storage_options: HashMap::new(),
            blob_root: "media".to_string(),
            cache_control: "public, max-age=31536000, immutable".to_string(),

            // Upload limits
            allowed_mime_types: vec![
                mime::IMAGE_JPEG.to_string(),
                "image/jpg".to_string(),
                mime::IMAGE_PNG.to_string(),
                "image/webp".to_string(),
                "image/avif".to_string(),
                "image/heic".to_string(),
                "image/heif".to_string(),
            ],
            max_property_images: 10,
            max_project_images: 5,
            upload_concurrency: 1,

            // Image processing
            max_dimension: 1600,
            webp_quality: 80,
        }
    }
}

impl MediaSettings {
    /// Load settings from file
    pub fn load(path: &str) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, path: &str) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Photo limit for a listing kind
    pub fn max_items(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Propiedades => self.max_property_images,
            ResourceKind::Emprendimientos => self.max_project_images,
        }
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.storage_url.is_empty() {
            errors.push("Storage URL cannot be empty".to_string());
        } else if url::Url::parse(&self.storage_url).is_err() {
            errors.push(format!("Storage URL is not a valid URL: {}", self.storage_url));
        }

        if self.blob_root.trim_matches('/').is_empty() {
            errors.push("Blob root cannot be empty".to_string());
        }

        if self.max_dimension == 0 {
            errors.push("Max dimension must be greater than 0".to_string());
        }

        if self.webp_quality == 0 || self.webp_quality > 100 {
            errors.push("WebP quality must be between 1 and 100".to_string());
        }

        if self.upload_concurrency == 0 {
            errors.push("Upload concurrency must be at least 1".to_string());
        }

        if self.allowed_mime_types.is_empty() {
            errors.push("At least one MIME type must be allowed".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
