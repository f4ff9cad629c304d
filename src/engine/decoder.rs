// src/engine/decoder.rs
//
// Decoder collaborator: encoded bytes -> StaticImage with a requested alpha
// disposition and color behavior. PNG, JPEG and WebP through the image crate.

use crate::engine::color::{ColorSpace, PixelFormat};
use crate::engine::common::run_with_panic_policy;
use crate::engine::image::{premultiply_u8, AlphaType, ImageInfo, StaticImage};
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::{BitmapError, Result};
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::Arc;

/// Whether the decoded frame is tagged with its color space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorBehavior {
    /// Tag the frame as sRGB.
    Tag,
    /// Leave the frame untagged.
    Ignore,
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(BitmapError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(BitmapError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Inspect the header and ensure the image dimensions are safe before decoding.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> Result<()> {
    if let Ok(reader) = ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return check_dimensions(width, height);
        }
    }
    Ok(())
}

/// Read `(width, height)` from the header without decoding pixels.
pub fn peek_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BitmapError::decode_failed(format!("failed to read image header: {e}")))?;
    if reader.format().is_none() {
        return Err(BitmapError::unsupported_format("unknown"));
    }
    reader
        .into_dimensions()
        .map_err(|e| BitmapError::decode_failed(format!("failed to read dimensions: {e}")))
}

/// Decode `bytes` into an 8-bit RGBA frame.
///
/// The frame is delivered with `alpha` as its alpha type; straight alpha is
/// what the codecs produce, so a premultiplied request costs one pass.
pub fn decode(bytes: &[u8], alpha: AlphaType, color: ColorBehavior) -> Result<StaticImage> {
    let format = detect_format(bytes).ok_or_else(|| BitmapError::unsupported_format("unknown"))?;
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP
    ) {
        return Err(BitmapError::unsupported_format(format!("{format:?}").to_lowercase()));
    }
    ensure_dimensions_safe(bytes)?;

    run_with_panic_policy("decode:image", || {
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| BitmapError::decode_failed(format!("decode failed: {e}")))?;
        let rgba = decoded.into_rgba8();
        let (width, height) = rgba.dimensions();
        // Defensive: the header may lie.
        check_dimensions(width, height)?;
        let mut pixels = rgba.into_raw();
        if alpha == AlphaType::Premultiplied {
            for px in pixels.chunks_exact_mut(4) {
                let a = px[3];
                px[0] = premultiply_u8(px[0], a);
                px[1] = premultiply_u8(px[1], a);
                px[2] = premultiply_u8(px[2], a);
            }
        }
        let color_space = match color {
            ColorBehavior::Tag => Some(ColorSpace::Srgb),
            ColorBehavior::Ignore => None,
        };
        let info = ImageInfo::new(width, height, PixelFormat::Rgba8, alpha, color_space);
        StaticImage::from_raster(info, pixels)
    })
}

/// Decode an element's encoded bytes, keeping them attached for re-decode.
pub fn decode_element(encoded: Arc<[u8]>) -> Result<StaticImage> {
    let image = decode(&encoded, AlphaType::Premultiplied, ColorBehavior::Tag)?;
    Ok(image.with_encoded_data(encoded))
}
