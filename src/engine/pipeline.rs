// src/engine/pipeline.rs
//
// Stage sequencing. Each stage takes the image by value and returns a new
// one; any stage error ends the run with nothing exposed.
//
// Resize ordering: a shrinking resize runs first so later passes touch fewer
// pixels, a growing resize runs last so the big buffer is allocated as late
// as possible.

use crate::engine::alpha::get_image_with_alpha_disposition;
use crate::engine::color::apply_color_space_conversion;
use crate::engine::crop::{crop_image, make_blank_image, Cropped};
use crate::engine::flip::flip_image_vertically;
use crate::engine::image::StaticImage;
use crate::engine::options::ParsedOptions;
use crate::engine::resample::{is_downscale, scale_image};
use crate::engine::source::SourceKind;
use crate::error::Result;
use crate::ops::AlphaDisposition;
use tracing::debug;

fn target_disposition(parsed: &ParsedOptions) -> AlphaDisposition {
    if parsed.premultiply_alpha {
        AlphaDisposition::Premultiply
    } else {
        AlphaDisposition::Unpremultiply
    }
}

/// Run the stage sequence that fits `kind`.
pub fn process(image: StaticImage, kind: SourceKind, parsed: &ParsedOptions) -> Result<StaticImage> {
    match kind {
        SourceKind::ImageData => process_image_data(image, parsed),
        _ => crop_and_convert(image, parsed),
    }
}

/// Crop, then (shrink), flip, color convert, alpha convert, (grow).
pub fn crop_and_convert(image: StaticImage, parsed: &ParsedOptions) -> Result<StaticImage> {
    let mut result = match crop_image(image, parsed)? {
        Cropped::Blank(blank) => return Ok(blank),
        Cropped::Region(region) => region,
    };

    let downscale = is_downscale(&result, parsed);
    debug!(
        target: "image_bitmap::pipeline",
        scale = parsed.should_scale_input,
        downscale,
        flip = parsed.flip_y,
        color = parsed.has_color_space_conversion,
        premultiply = parsed.premultiply_alpha,
        "stage plan"
    );
    if downscale {
        result = scale_image(result, parsed)?;
    }
    if parsed.flip_y {
        result = flip_image_vertically(result, parsed)?;
    }
    if parsed.has_color_space_conversion {
        result = apply_color_space_conversion(result, &parsed.color_params)?;
    }
    result = get_image_with_alpha_disposition(result, target_disposition(parsed))?;
    if parsed.should_scale_input && !downscale {
        result = scale_image(result, parsed)?;
    }
    Ok(result)
}

/// Straight-alpha pixel buffers: copy and convert the cropped region, then
/// (shrink), flip, (grow).
pub fn process_image_data(image: StaticImage, parsed: &ParsedOptions) -> Result<StaticImage> {
    let src_rect = parsed.crop_rect.intersection(&image.bounds());
    if src_rect.is_empty() {
        debug!(target: "image_bitmap::pipeline", crop = ?parsed.crop_rect, "crop outside pixel data");
        return make_blank_image(parsed);
    }
    let mut result = if src_rect == image.bounds() {
        image
    } else {
        image.make_subset(src_rect)?
    };
    if parsed.has_color_space_conversion {
        result = apply_color_space_conversion(result, &parsed.color_params)?;
    }
    result = get_image_with_alpha_disposition(result, target_disposition(parsed))?;

    let downscale = is_downscale(&result, parsed);
    if downscale {
        result = scale_image(result, parsed)?;
    }
    if parsed.flip_y {
        result = flip_image_vertically(result, parsed)?;
    }
    if parsed.should_scale_input && !downscale {
        result = scale_image(result, parsed)?;
    }
    Ok(result)
}
