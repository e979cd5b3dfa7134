//! Thumbnail generation pipeline
//!
//! Decodes a source image with the `image` crate, shrinks it to fit a square
//! bounding box and re-encodes it as JPEG at the requested quality.

use crate::error::ThumbnailError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::path::Path;

/// Encoded thumbnail plus the pixel size of the image it was made from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedThumbnail {
    pub bytes: Vec<u8>,
    pub source_width: u32,
    pub source_height: u32,
}

/// Generate a JPEG thumbnail that fits within `max_dimension` x `max_dimension`
pub fn generate_thumbnail(
    source: &Path,
    max_dimension: u32,
    quality: u8,
) -> Result<GeneratedThumbnail, ThumbnailError> {
    let img = ImageReader::open(source)
        .map_err(|e| ThumbnailError::unreadable(source, image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| ThumbnailError::unreadable(source, image::ImageError::IoError(e)))?
        .decode()
        .map_err(|e| ThumbnailError::unreadable(source, e))?;

    let (source_width, source_height) = img.dimensions();
    let resized = resize_to_fit(img, max_dimension);

    let bytes = encode_jpeg(&resized, quality).map_err(|e| ThumbnailError::Encode {
        path: source.to_path_buf(),
        source: e,
    })?;

    Ok(GeneratedThumbnail {
        bytes,
        source_width,
        source_height,
    })
}

/// Read the pixel size from the image header without decoding pixel data
pub fn probe_dimensions(source: &Path) -> Option<(u32, u32)> {
    image::image_dimensions(source).ok()
}

/// Target size for fitting `(width, height)` in a `max_dim` square. Never upscales.
pub fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    // Deserialized params skip the clamp in ThumbnailParams::new
    let max_dim = max_dim.max(1);
    let max_existing = width.max(height);
    if max_existing <= max_dim || max_existing == 0 {
        return (width, height);
    }

    let ratio = max_dim as f64 / max_existing as f64;
    let new_width = ((width as f64 * ratio).round() as u32).clamp(1, max_dim);
    let new_height = ((height as f64 * ratio).round() as u32).clamp(1, max_dim);
    (new_width, new_height)
}

fn resize_to_fit(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = fit_within(width, height, max_dim);
    if (new_width, new_height) == (width, height) {
        return img;
    }
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// JPEG has no alpha channel, so everything is flattened to RGB first.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)))?;
    Ok(buffer)
}
