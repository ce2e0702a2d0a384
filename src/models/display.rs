//! Display Helpers
//!
//! Derive gallery order and cover image from a listing's photo set.

use std::cmp::Ordering;

use serde::Serialize;

use super::media::{Images, MediaCollection, MediaItem, ResourceKind};

/// Shown when a listing has no usable photo
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.jpg";

/// One gallery slot as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    /// Media ID, or the URL itself for legacy photos
    pub identifier: String,
    /// URL or path the browser loads
    pub source: String,
    pub alt: Option<String>,
}

/// Serving URL for one media item
pub fn media_url(kind: ResourceKind, owner_id: &str, media_id: &str) -> String {
    format!("/api/{}/{}/media/{}", kind.as_str(), owner_id, media_id)
}

/// Display comparator: cover first, then sort order, then creation time.
///
/// Missing sort order counts as 0 and missing creation time as the epoch.
/// Ties on all keys fall back to the media ID so the order is total.
pub fn compare_items(a: &MediaItem, b: &MediaItem, cover_id: Option<&str>) -> Ordering {
    let is_cover = |item: &MediaItem| cover_id == Some(item.media_id.as_str());

    is_cover(b)
        .cmp(&is_cover(a))
        .then_with(|| a.effective_sort_order().cmp(&b.effective_sort_order()))
        .then_with(|| a.effective_created_at().cmp(&b.effective_created_at()))
        .then_with(|| a.media_id.cmp(&b.media_id))
}

/// Items of a collection in display order
pub fn sorted_items(collection: &MediaCollection) -> Vec<&MediaItem> {
    let cover_id = collection.valid_cover_id();
    let mut items: Vec<&MediaItem> = collection.items.iter().collect();
    items.sort_by(|a, b| compare_items(a, b, cover_id));
    items
}

/// The item shown as cover: first in display order
pub fn cover_item(collection: &MediaCollection) -> Option<&MediaItem> {
    let cover_id = collection.valid_cover_id();
    collection
        .items
        .iter()
        .min_by(|a, b| compare_items(a, b, cover_id))
}

/// Cover image reference for a listing. Falls back to the placeholder.
pub fn derive_cover_source(kind: ResourceKind, owner_id: &str, images: Option<&Images>) -> String {
    let source = match images {
        None => None,
        Some(Images::Legacy(urls)) => urls.first().cloned(),
        Some(Images::Collection(collection)) => {
            cover_item(collection).map(|item| media_url(kind, owner_id, &item.media_id))
        }
    };

    source.unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}

/// Gallery entries in display order. Empty when the listing has no photos.
pub fn derive_display_order(
    kind: ResourceKind,
    owner_id: &str,
    images: Option<&Images>,
) -> Vec<GalleryEntry> {
    match images {
        None => Vec::new(),
        Some(Images::Legacy(urls)) => urls
            .iter()
            .map(|url| GalleryEntry {
                identifier: url.clone(),
                source: url.clone(),
                alt: None,
            })
            .collect(),
        Some(Images::Collection(collection)) => sorted_items(collection)
            .into_iter()
            .map(|item| GalleryEntry {
                identifier: item.media_id.clone(),
                source: media_url(kind, owner_id, &item.media_id),
                alt: item.alt.clone(),
            })
            .collect(),
    }
}
