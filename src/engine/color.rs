// src/engine/color.rs
//
// Color spaces and pixel formats, plus the lcms2-backed color space
// conversion stage.

use crate::engine::image::{allocate_pixels, load_pixel, store_pixel, AlphaType, StaticImage};
use crate::error::{BitmapError, Result};
use lcms2::{
    CIExyY, CIExyYTRIPLE, Intent, PixelFormat as LcmsPixelFormat, Profile, ToneCurve, Transform,
};
use rayon::prelude::*;
use tracing::debug;

/// Color spaces a bitmap can be tagged with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Srgb,
    LinearSrgb,
    DisplayP3,
    Rec2020,
}

/// Storage format of a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit unorm RGBA.
    Rgba8,
    /// 16-bit float RGBA (little-endian half floats).
    RgbaF16,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::RgbaF16 => 8,
        }
    }
}

/// Whether a color conversion decodes the source transfer curve first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferFunctionBehavior {
    Respect,
    Ignore,
}

/// Target color representation of a bitmap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasColorParams {
    pub color_space: ColorSpace,
    pub pixel_format: PixelFormat,
}

impl Default for CanvasColorParams {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Srgb,
            pixel_format: PixelFormat::Rgba8,
        }
    }
}

impl CanvasColorParams {
    pub fn new(color_space: ColorSpace, pixel_format: PixelFormat) -> Self {
        Self {
            color_space,
            pixel_format,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.pixel_format.bytes_per_pixel()
    }
}


// Every supported space shares the D65 white point.
const D65: CIExyY = CIExyY {
    x: 0.3127,
    y: 0.3290,
    Y: 1.0,
};

// Rows handed to one transform; each band builds its own lcms2 transform.
const BAND_ROWS: usize = 64;

const fn xy(x: f64, y: f64) -> CIExyY {
    CIExyY { x, y, Y: 1.0 }
}

impl ColorSpace {
    fn primaries(self) -> CIExyYTRIPLE {
        match self {
            ColorSpace::Srgb | ColorSpace::LinearSrgb => CIExyYTRIPLE {
                Red: xy(0.64, 0.33),
                Green: xy(0.30, 0.60),
                Blue: xy(0.15, 0.06),
            },
            ColorSpace::DisplayP3 => CIExyYTRIPLE {
                Red: xy(0.680, 0.320),
                Green: xy(0.265, 0.690),
                Blue: xy(0.150, 0.060),
            },
            ColorSpace::Rec2020 => CIExyYTRIPLE {
                Red: xy(0.708, 0.292),
                Green: xy(0.170, 0.797),
                Blue: xy(0.131, 0.046),
            },
        }
    }

    // Parametric type 4: Y = (aX + b)^g for X >= d, Y = cX below.
    fn tone_curve(self) -> std::result::Result<ToneCurve, lcms2::Error> {
        match self {
            ColorSpace::LinearSrgb => Ok(ToneCurve::new(1.0)),
            ColorSpace::Srgb | ColorSpace::DisplayP3 => ToneCurve::new_parametric(
                4,
                &[2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.040_45],
            ),
            ColorSpace::Rec2020 => ToneCurve::new_parametric(
                4,
                &[
                    1.0 / 0.45,
                    1.0 / 1.099_3,
                    0.099_3 / 1.099_3,
                    1.0 / 4.5,
                    0.081_243,
                ],
            ),
        }
    }

    /// RGB profile for this space. With `Ignore` the curve is linear, so only
    /// the primaries take part in a conversion.
    pub fn profile(
        self,
        behavior: TransferFunctionBehavior,
    ) -> std::result::Result<Profile, lcms2::Error> {
        let curve = match behavior {
            TransferFunctionBehavior::Respect => self.tone_curve()?,
            TransferFunctionBehavior::Ignore => ToneCurve::new(1.0),
        };
        Profile::new_rgb(&D65, &self.primaries(), &[&curve, &curve, &curve])
    }
}

struct ColorTransform {
    transform: Transform<[f32; 4], [f32; 4]>,
    // Curves are applied to color, not to color scaled by coverage.
    unpremultiply: bool,
    alphas: Vec<f32>,
}

impl ColorTransform {
    fn new(
        src: ColorSpace,
        dst: ColorSpace,
        behavior: TransferFunctionBehavior,
        premultiplied: bool,
    ) -> Result<Self> {
        let build = || -> std::result::Result<Transform<[f32; 4], [f32; 4]>, lcms2::Error> {
            let from = src.profile(behavior)?;
            let to = dst.profile(behavior)?;
            Transform::new(
                &from,
                LcmsPixelFormat::RGBA_FLT,
                &to,
                LcmsPixelFormat::RGBA_FLT,
                Intent::RelativeColorimetric,
            )
        };
        let transform = build().map_err(|err| {
            BitmapError::color_conversion_failed(
                format!("{src:?}"),
                format!("{dst:?}"),
                err.to_string(),
            )
        })?;
        Ok(Self {
            transform,
            unpremultiply: premultiplied && behavior == TransferFunctionBehavior::Respect,
            alphas: Vec::new(),
        })
    }

    fn run(&mut self, row: &mut [[f32; 4]]) {
        self.alphas.clear();
        self.alphas.extend(row.iter().map(|px| px[3]));
        if self.unpremultiply {
            for px in row.iter_mut() {
                let alpha = px[3];
                if alpha > 0.0 {
                    for c in &mut px[..3] {
                        *c /= alpha;
                    }
                }
            }
        }
        self.transform.transform_in_place(row);
        for (px, &alpha) in row.iter_mut().zip(&self.alphas) {
            px[3] = alpha;
            if self.unpremultiply {
                for c in &mut px[..3] {
                    *c = if alpha > 0.0 { *c * alpha } else { 0.0 };
                }
            }
        }
    }
}

/// Re-express `image` in `target` space and `format`.
///
/// An untagged source is treated as sRGB. The output keeps the source alpha type.
pub fn convert_to_color_space(
    image: StaticImage,
    target: ColorSpace,
    format: PixelFormat,
    behavior: TransferFunctionBehavior,
) -> Result<StaticImage> {
    let source_space = image.color_space();
    if source_space == Some(target) && image.pixel_format() == format {
        return Ok(image);
    }
    let src = source_space.unwrap_or(ColorSpace::Srgb);
    let premultiplied = image.alpha_type() == AlphaType::Premultiplied;
    debug!(
        target: "image_bitmap::pipeline",
        from = ?source_space,
        to = ?target,
        ?format,
        ?behavior,
        "color space conversion"
    );
    let dst_info = image
        .info()
        .with_pixel_format(format)
        .with_color_space(Some(target));
    let mut pixels = allocate_pixels(&dst_info)?;
    let src_format = image.pixel_format();
    let src_bpp = src_format.bytes_per_pixel() as usize;
    let dst_bpp = format.bytes_per_pixel() as usize;
    let dst_row_bytes = dst_info.min_row_bytes();
    if dst_row_bytes == 0 {
        return StaticImage::from_raster(dst_info, pixels);
    }
    let width = image.width() as usize;
    pixels
        .par_chunks_mut(dst_row_bytes * BAND_ROWS)
        .enumerate()
        .try_for_each(|(band, dst_band)| -> Result<()> {
            let mut transform = if src == target {
                None
            } else {
                Some(ColorTransform::new(src, target, behavior, premultiplied)?)
            };
            let mut row = Vec::with_capacity(width);
            for (i, dst_row) in dst_band.chunks_exact_mut(dst_row_bytes).enumerate() {
                let y = (band * BAND_ROWS + i) as u32;
                row.clear();
                row.extend(
                    image
                        .row(y)
                        .chunks_exact(src_bpp)
                        .map(|px| load_pixel(src_format, px)),
                );
                if let Some(transform) = transform.as_mut() {
                    transform.run(&mut row);
                }
                for (px, out) in row.iter().zip(dst_row.chunks_exact_mut(dst_bpp)) {
                    store_pixel(format, *px, out);
                }
            }
            Ok(())
        })?;
    StaticImage::from_raster(dst_info, pixels)
}

/// Color Space Converter stage.
///
/// The transfer function is ignored for untagged sources (no curve to
/// respect) and for unpremultiplied sources.
pub fn apply_color_space_conversion(
    image: StaticImage,
    params: &CanvasColorParams,
) -> Result<StaticImage> {
    let behavior =
        if image.color_space().is_none() || image.alpha_type() == AlphaType::Unpremultiplied {
            TransferFunctionBehavior::Ignore
        } else {
            TransferFunctionBehavior::Respect
        };
    convert_to_color_space(image, params.color_space, params.pixel_format, behavior)
}
