//! Collection Merge
//!
//! Combine stored photos with newly processed ones.

use crate::models::{MediaCollection, MediaItem, COLLECTION_VERSION};

/// Build the collection to persist after an edit.
///
/// Existing items keep their relative order and new items are appended.
/// The requested cover is kept only if it names an item in the result;
/// otherwise the first item becomes the cover. Items the caller leaves out
/// of `existing` are dropped from the collection; their blobs are left in
/// place.
pub fn merge_collection(
    existing: Vec<MediaItem>,
    new_items: Vec<MediaItem>,
    desired_cover_id: Option<&str>,
) -> MediaCollection {
    let mut items = existing;
    items.extend(new_items);

    let cover_id = desired_cover_id
        .filter(|id| items.iter().any(|item| item.media_id == *id))
        .map(str::to_string)
        .or_else(|| items.first().map(|item| item.media_id.clone()));

    MediaCollection {
        version: COLLECTION_VERSION,
        cover_id,
        items,
    }
}
