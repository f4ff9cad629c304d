// src/engine/crop.rs
//
// Cropper: intersect the crop rectangle with the source bounds and hand back
// a view of the overlap, or a transparent placeholder when there is none.

use crate::engine::decoder::{self, ColorBehavior};
use crate::engine::image::{allocate_pixels, AlphaType, ImageInfo, StaticImage};
use crate::engine::options::ParsedOptions;
use crate::error::Result;
use tracing::debug;

/// Outcome of the crop stage.
#[derive(Debug)]
pub enum Cropped {
    /// No overlap with the source. The pipeline stops here.
    Blank(StaticImage),
    /// The overlapping region, ready for the remaining stages.
    Region(StaticImage),
}

/// Transparent premultiplied image of the requested output size in the
/// target color representation.
pub fn make_blank_image(parsed: &ParsedOptions) -> Result<StaticImage> {
    let (width, height) = parsed.output_size();
    let info = ImageInfo::new(
        width,
        height,
        parsed.color_params.pixel_format,
        AlphaType::Premultiplied,
        Some(parsed.color_params.color_space),
    );
    let pixels = allocate_pixels(&info)?;
    StaticImage::from_raster(info, pixels)
}

fn wants_redecode(image: &StaticImage, parsed: &ParsedOptions) -> bool {
    !parsed.premultiply_alpha
        && image.encoded_data().is_some()
        && image.alpha_type() == AlphaType::Premultiplied
        && !image.is_opaque()
}

/// Crop `image` to `parsed.crop_rect`.
///
/// A premultiplied, non-opaque image that still carries its encoded bytes is
/// decoded again straight into unpremultiplied form when the caller does not
/// want premultiplied output, instead of dividing already rounded values.
pub fn crop_image(image: StaticImage, parsed: &ParsedOptions) -> Result<Cropped> {
    let bounds = image.bounds();
    let src_rect = parsed.crop_rect.intersection(&bounds);
    if src_rect.is_empty() {
        debug!(
            target: "image_bitmap::pipeline",
            crop = ?parsed.crop_rect,
            width = bounds.width,
            height = bounds.height,
            "crop outside source, producing blank image"
        );
        return make_blank_image(parsed).map(Cropped::Blank);
    }

    let mut result = image;
    if wants_redecode(&result, parsed) {
        if let Some(encoded) = result.encoded_data().cloned() {
            let behavior = if parsed.has_color_space_conversion {
                ColorBehavior::Tag
            } else {
                ColorBehavior::Ignore
            };
            debug!(target: "image_bitmap::pipeline", ?behavior, "re-decoding unpremultiplied");
            result = decoder::decode(&encoded, AlphaType::Unpremultiplied, behavior)?
                .with_encoded_data(encoded);
        }
    }

    if src_rect != bounds {
        result = result.make_subset(src_rect)?;
    }
    Ok(Cropped::Region(result))
}
