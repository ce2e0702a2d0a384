//! Image Models
//!
//! Formats, dimensions and orientation used by the upload pipeline.

use serde::{Deserialize, Serialize};

/// Image format accepted for upload or produced by the pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Heic,
}

impl ImageFormat {
    /// Format for a MIME type, including the non-standard `image/jpg`
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/avif" => Some(Self::Avif),
            "image/heic" | "image/heif" => Some(Self::Heic),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Heic => "heic",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Heic => "image/heic",
        }
    }
}

impl Default for ImageFormat {
    fn default() -> Self {
        Self::WebP
    }
}

/// Image dimensions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn longest_side(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Scale down so the longer side is at most `max_side`, keeping the
    /// aspect ratio. Never scales up.
    pub fn fit_within(&self, max_side: u32) -> Self {
        let longest = self.longest_side();
        if longest <= max_side || longest == 0 {
            return *self;
        }

        let ratio = max_side as f64 / longest as f64;
        let width = ((self.width as f64 * ratio).round() as u32).clamp(1, max_side);
        let height = ((self.height as f64 * ratio).round() as u32).clamp(1, max_side);
        Self { width, height }
    }
}

/// EXIF orientation tag (values 1 to 8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation(pub u32);

impl Orientation {
    pub const NORMAL: Orientation = Orientation(1);

    /// Clockwise rotation, horizontal flip and vertical flip needed to make
    /// the image upright. Rotation is applied before flipping.
    pub fn transforms(&self) -> (Option<u16>, bool, bool) {
        match self.0 {
            2 => (None, true, false),
            3 => (Some(180), false, false),
            4 => (None, false, true),
            5 => (Some(90), true, false),
            6 => (Some(90), false, false),
            7 => (Some(270), true, false),
            8 => (Some(270), false, false),
            _ => (None, false, false),
        }
    }

    /// Whether the stored pixels differ from the upright image
    pub fn needs_correction(&self) -> bool {
        self.transforms() != (None, false, false)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_landscape() {
        let dims = ImageDimensions::new(4000, 3000).fit_within(1600);
        assert_eq!(dims, ImageDimensions::new(1600, 1200));
    }

    #[test]
    fn test_fit_within_portrait() {
        let dims = ImageDimensions::new(1000, 3000).fit_within(1600);
        assert_eq!(dims, ImageDimensions::new(533, 1600));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        let dims = ImageDimensions::new(800, 600);
        assert_eq!(dims.fit_within(1600), dims);
    }

    #[test]
    fn test_image_format() {
        assert_eq!(ImageFormat::from_mime("image/jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime("image/heif"), Some(ImageFormat::Heic));
        assert_eq!(ImageFormat::from_mime("image/gif"), None);
        assert_eq!(ImageFormat::WebP.mime_type(), "image/webp");
        assert_eq!(ImageFormat::WebP.extension(), "webp");
    }

    #[test]
    fn test_orientation_transforms() {
        assert!(!Orientation::NORMAL.needs_correction());
        assert_eq!(Orientation(6).transforms(), (Some(90), false, false));
        assert_eq!(Orientation(8).transforms(), (Some(270), false, false));
        assert!(!Orientation(42).needs_correction());
    }
}
