//! Image Service
//!
//! Decode, orient, resize and re-encode uploaded photos.

use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::models::{ImageDimensions, ImageFormat, Orientation};

/// Image processing error
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image encode error: {0}")]
    Encode(String),
    #[error("HEIF decode error: {0}")]
    Heif(String),
    #[error("Empty image")]
    Empty,
}

/// Result of normalizing one upload
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Encoded bytes
    pub data: Vec<u8>,
    /// Output format
    pub format: ImageFormat,
    /// Dimensions of the encoded output
    pub dimensions: ImageDimensions,
    /// Dimensions before resizing, after orientation
    pub source_dimensions: ImageDimensions,
}

impl EncodedImage {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Image service for the upload pipeline
#[derive(Debug, Clone)]
pub struct ImageService {
    /// Longest allowed side in pixels
    max_dimension: u32,
    /// WebP quality (1-100)
    quality: u8,
}

impl ImageService {
    /// Create a new image service
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Whether this build can decode uploads of the given MIME type.
    ///
    /// AVIF needs the `avif` feature and HEIC/HEIF the `heif` feature.
    pub fn can_decode(mime_type: &str) -> bool {
        match ImageFormat::from_mime(mime_type) {
            Some(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) => true,
            Some(ImageFormat::Avif) => cfg!(feature = "avif"),
            Some(ImageFormat::Heic) => cfg!(feature = "heif"),
            None => false,
        }
    }

    /// Read the EXIF orientation tag. Missing or unreadable EXIF is upright.
    pub fn read_orientation(data: &[u8]) -> Orientation {
        let mut cursor = Cursor::new(data);
        let exif = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(_) => return Orientation::NORMAL,
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation)
            .unwrap_or_default()
    }

    /// Apply an EXIF orientation so the pixels are upright
    pub fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
        let (rotate, flip_h, flip_v) = orientation.transforms();

        let img = match rotate {
            Some(90) => img.rotate90(),
            Some(180) => img.rotate180(),
            Some(270) => img.rotate270(),
            _ => img,
        };
        let img = if flip_h { img.fliph() } else { img };
        if flip_v {
            img.flipv()
        } else {
            img
        }
    }

    /// Decode, orient, bound to the maximum dimension and re-encode as WebP.
    ///
    /// The output carries no EXIF or other metadata.
    pub fn normalize(&self, data: &[u8]) -> Result<EncodedImage, ImageError> {
        let (img, orientation) = Self::decode(data)?;
        if orientation.needs_correction() {
            tracing::debug!(orientation = orientation.0, "Applying EXIF orientation");
        }
        let img = Self::apply_orientation(img, orientation);

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::Empty);
        }
        let source_dimensions = ImageDimensions::new(width, height);
        let target = source_dimensions.fit_within(self.max_dimension);

        let img = if target == source_dimensions {
            img
        } else {
            img.resize_exact(target.width, target.height, FilterType::Lanczos3)
        };

        let data = self.encode_webp(&img)?;
        let (width, height) = img.dimensions();

        Ok(EncodedImage {
            data,
            format: ImageFormat::WebP,
            dimensions: ImageDimensions::new(width, height),
            source_dimensions,
        })
    }

    /// Decode pixels and the orientation still to apply
    fn decode(data: &[u8]) -> Result<(DynamicImage, Orientation), ImageError> {
        #[cfg(feature = "heif")]
        if infer::image::is_heif(data) {
            // libheif already applies the container's rotation and mirroring
            return Ok((decode_heif(data)?, Orientation::NORMAL));
        }

        let img = image::load_from_memory(data)?;
        Ok((img, Self::read_orientation(data)))
    }

    /// Lossy WebP at the configured quality
    fn encode_webp(&self, img: &DynamicImage) -> Result<Vec<u8>, ImageError> {
        let (width, height) = img.dimensions();
        let quality = self.quality as f32;

        let encoded = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            webp::Encoder::from_rgba(&rgba, width, height).encode_simple(false, quality)
        } else {
            let rgb = img.to_rgb8();
            webp::Encoder::from_rgb(&rgb, width, height).encode_simple(false, quality)
        };

        encoded
            .map(|memory| memory.to_vec())
            .map_err(|e| ImageError::Encode(format!("{:?}", e)))
    }
}

#[cfg(feature = "heif")]
fn decode_heif(data: &[u8]) -> Result<DynamicImage, ImageError> {
    use libheif_rs::{ColorSpace, HeifContext, HeifError, LibHeif, RgbChroma};

    let heif_error = |e: HeifError| ImageError::Heif(e.to_string());

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data).map_err(heif_error)?;
    let handle = ctx.primary_image_handle().map_err(heif_error)?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)
        .map_err(heif_error)?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| ImageError::Heif("no interleaved plane".to_string()))?;

    let (width, height) = (plane.width, plane.height);
    let row_len = width as usize * 4;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let start = y * plane.stride;
        let row = plane
            .data
            .get(start..start + row_len)
            .ok_or_else(|| ImageError::Heif("truncated plane".to_string()))?;
        pixels.extend_from_slice(row);
    }

    image::RgbaImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgba8)
        .ok_or(ImageError::Empty)
}

impl Default for ImageService {
    fn default() -> Self {
        Self::new(1600, 80)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat as ImgFormat, Rgb, RgbImage, Rgba, RgbaImage};

    pub(crate) fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImgFormat::Jpeg)
            .unwrap();
        buffer
    }

    /// JPEG carrying an EXIF APP1 segment with the given Orientation tag
    pub(crate) fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
        let [hi, lo] = orientation.to_be_bytes();
        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&[
            b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, // big-endian TIFF header
            0x00, 0x01, // one IFD entry
            0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, hi, lo, 0x00, 0x00, // Orientation, SHORT
            0x00, 0x00, 0x00, 0x00, // no next IFD
        ]);

        let jpeg = jpeg_bytes(width, height);
        let segment_len = (app1.len() + 2) as u16;
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&segment_len.to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 128]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImgFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_normalize_downscales_to_cap() {
        let service = ImageService::new(1600, 80);
        let encoded = service.normalize(&jpeg_bytes(2000, 1000)).unwrap();

        assert_eq!(encoded.format, ImageFormat::WebP);
        assert_eq!(encoded.dimensions, ImageDimensions::new(1600, 800));
        assert_eq!(encoded.source_dimensions, ImageDimensions::new(2000, 1000));
        assert_eq!(&encoded.data[0..4], b"RIFF");
        assert_eq!(&encoded.data[8..12], b"WEBP");
        assert_eq!(encoded.size(), encoded.data.len() as u64);
    }

    #[test]
    fn test_normalize_never_upscales() {
        let service = ImageService::new(1600, 80);
        let encoded = service.normalize(&png_bytes(64, 48)).unwrap();
        assert_eq!(encoded.dimensions, ImageDimensions::new(64, 48));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let service = ImageService::default();
        assert!(matches!(
            service.normalize(b"definitely not an image"),
            Err(ImageError::Decode(_))
        ));
    }

    #[test]
    fn test_orientation_without_exif_is_normal() {
        assert_eq!(ImageService::read_orientation(&jpeg_bytes(4, 4)), Orientation::NORMAL);
        assert_eq!(ImageService::read_orientation(b""), Orientation::NORMAL);
    }

    #[test]
    fn test_exif_orientation_is_applied() {
        let data = jpeg_with_orientation(40, 20, 6);
        assert_eq!(ImageService::read_orientation(&data), Orientation(6));

        let encoded = ImageService::default().normalize(&data).unwrap();
        assert_eq!(encoded.source_dimensions, ImageDimensions::new(20, 40));
        assert_eq!(encoded.dimensions, ImageDimensions::new(20, 40));
    }

    #[test]
    fn test_exif_mirror_keeps_dimensions() {
        let data = jpeg_with_orientation(40, 20, 2);
        assert_eq!(ImageService::read_orientation(&data), Orientation(2));
        let encoded = ImageService::default().normalize(&data).unwrap();
        assert_eq!(encoded.dimensions, ImageDimensions::new(40, 20));
    }

    #[test]
    fn test_can_decode() {
        assert!(ImageService::can_decode("image/jpeg"));
        assert!(ImageService::can_decode("image/jpg"));
        assert!(ImageService::can_decode("image/webp"));
        assert_eq!(ImageService::can_decode("image/avif"), cfg!(feature = "avif"));
        assert_eq!(ImageService::can_decode("image/heic"), cfg!(feature = "heif"));
        assert!(!ImageService::can_decode("application/pdf"));
    }

    #[cfg(feature = "avif")]
    pub(crate) fn avif_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([90, 140, 200]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImgFormat::Avif)
            .unwrap();
        buffer
    }

    #[cfg(feature = "avif")]
    #[test]
    fn test_normalize_avif() {
        let encoded = ImageService::default().normalize(&avif_bytes(64, 32)).unwrap();
        assert_eq!(encoded.format, ImageFormat::WebP);
        assert_eq!(encoded.dimensions, ImageDimensions::new(64, 32));
        assert_eq!(&encoded.data[8..12], b"WEBP");
    }

    #[cfg(feature = "heif")]
    pub(crate) fn heic_bytes(width: u32, height: u32) -> Vec<u8> {
        use libheif_rs::{Channel, ColorSpace, CompressionFormat, HeifContext, Image, LibHeif, RgbChroma};

        let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).unwrap();
        image.create_plane(Channel::Interleaved, width, height, 8).unwrap();
        {
            let planes = image.planes_mut();
            let mut plane = planes.interleaved.unwrap();
            for y in 0..height as usize {
                let row = &mut plane.data[y * plane.stride..y * plane.stride + width as usize * 3];
                for px in row.chunks_mut(3) {
                    px.copy_from_slice(&[180, 60, 30]);
                }
            }
        }

        let lib_heif = LibHeif::new();
        let mut ctx = HeifContext::new().unwrap();
        let mut encoder = lib_heif.encoder_for_format(CompressionFormat::Hevc).unwrap();
        ctx.encode_image(&image, &mut encoder, None).unwrap();
        ctx.write_to_bytes().unwrap()
    }

    #[cfg(feature = "heif")]
    #[test]
    fn test_normalize_heic() {
        let encoded = ImageService::default().normalize(&heic_bytes(64, 32)).unwrap();
        assert_eq!(encoded.format, ImageFormat::WebP);
        assert_eq!(encoded.dimensions, ImageDimensions::new(64, 32));
    }

    #[test]
    fn test_apply_orientation_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let rotated = ImageService::apply_orientation(img.clone(), Orientation(6));
        assert_eq!(rotated.dimensions(), (20, 40));

        let transposed = ImageService::apply_orientation(img.clone(), Orientation(5));
        assert_eq!(transposed.dimensions(), (20, 40));

        let mirrored = ImageService::apply_orientation(img, Orientation(2));
        assert_eq!(mirrored.dimensions(), (40, 20));
    }

    #[test]
    fn test_apply_orientation_moves_pixels() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let img = DynamicImage::ImageRgb8(img);

        let flipped = ImageService::apply_orientation(img, Orientation(2));
        assert_eq!(flipped.to_rgb8().get_pixel(1, 0), &Rgb([255, 0, 0]));
    }
}
