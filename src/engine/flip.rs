// src/engine/flip.rs
//
// Orientation Flipper.

use crate::engine::image::{AlphaType, StaticImage, Surface};
use crate::engine::options::ParsedOptions;
use crate::error::Result;
use tracing::debug;

/// Mirror `image` vertically.
///
/// Straight-alpha pixels the caller wants kept straight are flipped by
/// swapping rows in a host copy, so no alpha rounding happens. Everything
/// else is drawn upside down onto a new surface with a copy blend, which
/// leaves the result premultiplied.
pub fn flip_image_vertically(image: StaticImage, parsed: &ParsedOptions) -> Result<StaticImage> {
    // A premultiplied element re-decoded as straight by the cropper counts too.
    let straight =
        parsed.source_is_unpremul || image.alpha_type() == AlphaType::Unpremultiplied;
    if straight && !parsed.premultiply_alpha {
        debug!(target: "image_bitmap::pipeline", strategy = "row-swap", "flip");
        flip_rows(image)
    } else {
        debug!(target: "image_bitmap::pipeline", strategy = "draw", "flip");
        flip_by_draw(image)
    }
}

fn flip_rows(image: StaticImage) -> Result<StaticImage> {
    let (info, mut pixels) = image.into_compact_pixels()?;
    let row_bytes = info.min_row_bytes();
    let height = info.height as usize;
    for y in 0..height / 2 {
        let (top, bottom) = pixels.split_at_mut((height - 1 - y) * row_bytes);
        top[y * row_bytes..(y + 1) * row_bytes].swap_with_slice(&mut bottom[..row_bytes]);
    }
    StaticImage::from_raster(info, pixels)
}

fn flip_by_draw(image: StaticImage) -> Result<StaticImage> {
    let mut surface = Surface::new_raster(
        image.width(),
        image.height(),
        image.pixel_format(),
        image.color_space(),
    )?;
    surface.draw_image(&image, true);
    surface.snapshot()
}
