//! PropMedia Services
//!
//! Upload pipeline, storage and persistence of listing photos.

pub mod collection;
pub mod image;
pub mod media;
pub mod records;
pub mod storage;
pub mod upload;

pub use collection::merge_collection;
pub use self::image::ImageService;
pub use media::MediaService;
pub use records::{MemoryRecordStore, RecordStore};
pub use storage::{BlobStore, ObjectBlobStore};
pub use upload::UploadService;
