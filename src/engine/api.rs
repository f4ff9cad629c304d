// src/engine/api.rs
//
// Synchronous construction entry points.

use crate::engine::bitmap::ImageBitmap;
use crate::engine::guard::check_buffer_sizes;
use crate::engine::options::{parse_options, ParsedOptions};
use crate::engine::pipeline::process;
use crate::engine::source::BitmapSource;
use crate::error::Result;
use crate::ops::{ImageBitmapOptions, IntRect};
use tracing::{debug, warn};

/// Parse and size-check options for `source` without touching its pixels.
pub fn prepare(
    source: &BitmapSource,
    crop: Option<IntRect>,
    options: &ImageBitmapOptions,
) -> Result<ParsedOptions> {
    let size = source.natural_size()?;
    let parsed = parse_options(options, crop, size, source.is_unpremultiplied())?;
    check_buffer_sizes(&parsed)?;
    Ok(parsed)
}

/// Build an ImageBitmap from `source`.
///
/// The overflow guard runs before the source is decoded, drawn or copied.
/// On any failure nothing is returned but the error.
pub fn create_image_bitmap(
    source: BitmapSource,
    crop: Option<IntRect>,
    options: &ImageBitmapOptions,
) -> Result<ImageBitmap> {
    let parsed = prepare(&source, crop, options)?;
    let resolved = source.resolve()?;
    debug!(
        target: "image_bitmap::pipeline",
        kind = ?resolved.kind,
        width = resolved.image.width(),
        height = resolved.image.height(),
        origin_clean = resolved.origin_clean,
        "create image bitmap"
    );
    let image = process(resolved.image, resolved.kind, &parsed)?;
    Ok(ImageBitmap::new(image, resolved.origin_clean))
}

/// Like `create_image_bitmap`, but a failure yields an empty bitmap.
pub fn create_image_bitmap_or_empty(
    source: BitmapSource,
    crop: Option<IntRect>,
    options: &ImageBitmapOptions,
) -> ImageBitmap {
    create_image_bitmap(source, crop, options).unwrap_or_else(|err| {
        warn!(
            target: "image_bitmap::pipeline",
            code = err.category().code(),
            %err,
            "image bitmap construction failed, returning empty bitmap"
        );
        ImageBitmap::empty()
    })
}

/// Build a new bitmap from the pixels of an existing one.
pub fn create_image_bitmap_from_bitmap(
    bitmap: &ImageBitmap,
    crop: Option<IntRect>,
    options: &ImageBitmapOptions,
) -> Result<ImageBitmap> {
    create_image_bitmap(BitmapSource::from_bitmap(bitmap)?, crop, options)
}
