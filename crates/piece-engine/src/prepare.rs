use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use piece_contracts::image::EncodedImage;

const JPEG_QUALITY: u8 = 90;
const MIN_DIM: u32 = 128;

/// Reads an image file into an [`EncodedImage`].
///
/// Without `max_dim` the file bytes are sent as-is. With it, the image is
/// flattened onto white, shrunk to fit `max_dim` and re-encoded as JPEG, which
/// keeps the payload in line with the media type the client declares. Files
/// the decoder cannot read fall back to their raw bytes.
pub fn prepare_image(path: &Path, max_dim: Option<u32>) -> Result<EncodedImage> {
    let Some(max_dim) = max_dim else {
        return Ok(EncodedImage::from_path(path)?);
    };
    match reencode_as_jpeg(path, max_dim.max(MIN_DIM)) {
        Ok(bytes) => Ok(EncodedImage::from_bytes(&bytes, "image/jpeg")?),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "could not re-encode image, sending original bytes"
            );
            Ok(EncodedImage::from_path(path)?)
        }
    }
}

fn reencode_as_jpeg(path: &Path, max_dim: u32) -> Result<Vec<u8>> {
    let decoded =
        image::open(path).with_context(|| format!("failed decoding {}", path.display()))?;
    let rgba = decoded.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend =
            |channel: u8| -> u8 { ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8 };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    let mut prepared = DynamicImage::ImageRgb8(flattened);
    if prepared.width() > max_dim || prepared.height() > max_dim {
        prepared = prepared.resize(max_dim, max_dim, FilterType::Triangle);
    }

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&prepared)
        .context("JPEG encode failed")?;
    Ok(bytes)
}
