// src/engine/alpha.rs
//
// Alpha Converter: premultiplied <-> straight alpha.
//
// Two strategies:
// - readback: copy pixels to a host buffer with the alpha type changed.
//   Used for every unpremultiply and for small images.
// - draw: copy-blend onto a new surface, which premultiplies as it draws.
//   Used to premultiply images at or above the readback threshold.
//
// Both work on gamma-encoded values; the color space tag is carried over.

use crate::engine::color::ColorSpace;
use crate::engine::config::config;
use crate::engine::image::{AlphaType, StaticImage, Surface};
use crate::error::{BitmapError, Result};
use crate::ops::AlphaDisposition;
use tracing::debug;

/// Return `image` with the alpha type asked for by `disposition`.
///
/// `DontChange` is a caller bug and yields `InvalidAlphaDisposition`. A
/// matching alpha type returns the input untouched.
pub fn get_image_with_alpha_disposition(
    image: StaticImage,
    disposition: AlphaDisposition,
) -> Result<StaticImage> {
    get_image_with_alpha_disposition_with_threshold(
        image,
        disposition,
        config().readback_threshold_pixels,
    )
}

/// Same as `get_image_with_alpha_disposition` with an explicit readback threshold.
pub fn get_image_with_alpha_disposition_with_threshold(
    image: StaticImage,
    disposition: AlphaDisposition,
    readback_threshold_pixels: u64,
) -> Result<StaticImage> {
    let target = match disposition {
        AlphaDisposition::Premultiply => AlphaType::Premultiplied,
        AlphaDisposition::Unpremultiply => AlphaType::Unpremultiplied,
        AlphaDisposition::DontChange => return Err(BitmapError::invalid_alpha_disposition()),
    };
    if image.alpha_type() == target {
        return Ok(image);
    }

    if target == AlphaType::Unpremultiplied || image.area() < readback_threshold_pixels {
        debug!(
            target: "image_bitmap::alpha",
            strategy = "readback",
            ?target,
            pixels = image.area(),
            "alpha conversion"
        );
        convert_by_readback(image, target)
    } else {
        debug!(
            target: "image_bitmap::alpha",
            strategy = "draw",
            ?target,
            pixels = image.area(),
            "alpha conversion"
        );
        premultiply_by_draw(image)
    }
}

fn convert_by_readback(image: StaticImage, target: AlphaType) -> Result<StaticImage> {
    let space = image.color_space();
    let dst_info = image.info().with_alpha_type(target).with_color_space(None);
    let pixels = image.read_pixels(&dst_info)?;
    StaticImage::from_raster(dst_info.with_color_space(space), pixels)
}

fn premultiply_by_draw(image: StaticImage) -> Result<StaticImage> {
    let space = image.color_space();
    let image = if space == Some(ColorSpace::Srgb) {
        image.retagged(None)
    } else {
        image
    };
    let mut surface = Surface::new_raster(
        image.width(),
        image.height(),
        image.pixel_format(),
        image.color_space(),
    )?;
    surface.draw_image(&image, false);
    Ok(surface.snapshot()?.retagged(space))
}
