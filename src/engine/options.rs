// src/engine/options.rs
//
// Option Parser: turns caller-supplied strings, crop rectangle and source
// size into a validated `ParsedOptions`.

use crate::engine::color::{CanvasColorParams, ColorSpace, PixelFormat};
use crate::error::{BitmapError, Result};
use crate::ops::{
    ColorSpaceConversion, ImageBitmapOptions, ImageOrientation, IntRect, PremultiplyAlpha,
    ResizeQuality,
};

/// Canonical, validated construction options. Immutable once parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedOptions {
    pub flip_y: bool,
    pub premultiply_alpha: bool,
    pub has_color_space_conversion: bool,
    pub color_params: CanvasColorParams,
    /// Normalized: width and height are never negative.
    pub crop_rect: IntRect,
    pub resize_width: u32,
    pub resize_height: u32,
    /// False iff the resize size equals the crop size.
    pub should_scale_input: bool,
    pub resize_quality: ResizeQuality,
    pub source_is_unpremul: bool,
}

impl ParsedOptions {
    /// Output size of the pipeline.
    pub fn output_size(&self) -> (u32, u32) {
        if self.should_scale_input {
            (self.resize_width, self.resize_height)
        } else {
            (self.crop_rect.width as u32, self.crop_rect.height as u32)
        }
    }
}

fn color_params_for(conversion: ColorSpaceConversion) -> (bool, CanvasColorParams) {
    let wide = |space| (true, CanvasColorParams::new(space, PixelFormat::RgbaF16));
    match conversion {
        ColorSpaceConversion::None | ColorSpaceConversion::Default | ColorSpaceConversion::Srgb => {
            (false, CanvasColorParams::default())
        }
        ColorSpaceConversion::LinearRgb => wide(ColorSpace::LinearSrgb),
        ColorSpaceConversion::P3 => wide(ColorSpace::DisplayP3),
        ColorSpaceConversion::Rec2020 => wide(ColorSpace::Rec2020),
    }
}

// Aspect-preserving fill-in of the omitted side. Float math rounded up.
fn scaled_side(given: u32, crop_given_side: i32, crop_other_side: i32) -> u32 {
    let value = (given as f32 / crop_given_side as f32 * crop_other_side as f32).ceil();
    value as u32
}

/// Parse `options` against a source of `source_size`.
///
/// `crop` defaults to the full source bounds; a "backwards" rectangle is
/// normalized, never rejected. A zero-area crop or a zero resize side is an
/// `InvalidArgument`; an unknown option string is an `InvalidOption`.
pub fn parse_options(
    options: &ImageBitmapOptions,
    crop: Option<IntRect>,
    source_size: (u32, u32),
    source_is_unpremul: bool,
) -> Result<ParsedOptions> {
    let flip_y = ImageOrientation::parse(&options.image_orientation)? == ImageOrientation::FlipY;
    let premultiply_alpha =
        PremultiplyAlpha::parse(&options.premultiply_alpha)?.wants_premultiplied();
    let (has_color_space_conversion, color_params) =
        color_params_for(ColorSpaceConversion::parse(&options.color_space_conversion)?);
    let resize_quality = ResizeQuality::parse(&options.resize_quality)?;

    if let Some(rect) = crop {
        if rect.width == 0 || rect.height == 0 {
            return Err(BitmapError::invalid_argument(
                "crop",
                format!("{}x{}", rect.width, rect.height),
                "crop width and height must be non-zero",
            ));
        }
    }
    for (name, value) in [
        ("resizeWidth", options.resize_width),
        ("resizeHeight", options.resize_height),
    ] {
        if value == Some(0) {
            return Err(BitmapError::invalid_argument(
                name,
                "0",
                "resize dimensions must be non-zero",
            ));
        }
    }

    let crop_rect = match crop {
        Some(rect) => rect.normalized(),
        None => IntRect::from_size(source_size.0, source_size.1),
    };
    if crop_rect.is_empty() {
        return Err(BitmapError::invalid_argument(
            "source",
            format!("{}x{}", source_size.0, source_size.1),
            "source image has zero area",
        ));
    }

    let (resize_width, resize_height) = match (options.resize_width, options.resize_height) {
        (None, None) => (crop_rect.width as u32, crop_rect.height as u32),
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scaled_side(w, crop_rect.width, crop_rect.height)),
        (None, Some(h)) => (scaled_side(h, crop_rect.height, crop_rect.width), h),
    };
    let should_scale_input = (resize_width, resize_height)
        != (crop_rect.width as u32, crop_rect.height as u32);

    Ok(ParsedOptions {
        flip_y,
        premultiply_alpha,
        has_color_space_conversion,
        color_params,
        crop_rect,
        resize_width,
        resize_height,
        should_scale_input,
        resize_quality,
        source_is_unpremul,
    })
}
