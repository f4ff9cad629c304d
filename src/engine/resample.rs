// src/engine/resample.rs
//
// Resampler on fast_image_resize, with an image-crate fallback for 8-bit
// pixels. Resizes a StaticImage to the parsed resize size.

use crate::engine::color::{ColorSpace, PixelFormat};
use crate::engine::common::run_with_panic_policy;
use crate::engine::image::{allocate_pixels, load_pixel, store_pixel, AlphaType, StaticImage};
use crate::engine::options::ParsedOptions;
use crate::error::{BitmapError, Result};
use crate::ops::ResizeQuality;
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::imageops::FilterType;
use image::RgbaImage;
use tracing::debug;

/// Filter for each quality level.
pub fn resize_alg(quality: ResizeQuality) -> fir::ResizeAlg {
    match quality {
        ResizeQuality::Pixelated => fir::ResizeAlg::Nearest,
        ResizeQuality::Low => fir::ResizeAlg::Convolution(fir::FilterType::Bilinear),
        ResizeQuality::Medium => fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
        ResizeQuality::High => fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3),
    }
}

fn fallback_filter(quality: ResizeQuality) -> FilterType {
    match quality {
        ResizeQuality::Pixelated => FilterType::Nearest,
        ResizeQuality::Low => FilterType::Triangle,
        ResizeQuality::Medium => FilterType::CatmullRom,
        ResizeQuality::High => FilterType::Lanczos3,
    }
}

/// True when the requested resize shrinks `image`: scale first, then
/// transform the smaller buffer.
pub fn is_downscale(image: &StaticImage, parsed: &ParsedOptions) -> bool {
    parsed.should_scale_input
        && (parsed.resize_width as u64 * parsed.resize_height as u64) < image.area()
}

/// Resize `image` to `(parsed.resize_width, parsed.resize_height)`.
///
/// A gamma-encoded sRGB tag is dropped for the duration of the resample and
/// restored afterwards, so filtering happens on the stored values.
pub fn scale_image(image: StaticImage, parsed: &ParsedOptions) -> Result<StaticImage> {
    let target = (parsed.resize_width, parsed.resize_height);
    if image.size() == target {
        return Ok(image);
    }
    let original_space = image.color_space();
    let image = if original_space == Some(ColorSpace::Srgb) {
        image.retagged(None)
    } else {
        image
    };
    image.note_readback();
    debug!(
        target: "image_bitmap::pipeline",
        from_width = image.width(),
        from_height = image.height(),
        to_width = target.0,
        to_height = target.1,
        quality = ?parsed.resize_quality,
        "resample"
    );
    let resized = run_with_panic_policy("resample", || match image.pixel_format() {
        PixelFormat::Rgba8 => resize_u8(&image, target, parsed.resize_quality),
        PixelFormat::RgbaF16 => resize_f16(&image, target, parsed.resize_quality),
    })?;
    Ok(resized.retagged(original_space))
}

fn compact_fir_image(image: &StaticImage) -> fir::images::Image<'static> {
    let mut out = fir::images::Image::new(image.width(), image.height(), PixelType::U8x4);
    let row_bytes = image.info().min_row_bytes();
    for (y, row) in out.buffer_mut().chunks_exact_mut(row_bytes).enumerate() {
        row.copy_from_slice(image.row(y as u32));
    }
    out
}

// Straight alpha must be premultiplied around the convolution, which needs
// a private mutable copy. Otherwise the view is fed in place via crop.
fn resize_with_fir(
    image: &StaticImage,
    dst: &mut fir::images::Image<'static>,
    options: ResizeOptions,
) -> std::result::Result<(), String> {
    let mut resizer = fir::Resizer::new();
    let needs_mul_div = image.alpha_type() == AlphaType::Unpremultiplied && !image.is_opaque();
    if needs_mul_div {
        let mut src = compact_fir_image(image);
        let mul_div = MulDiv::default();
        mul_div
            .multiply_alpha_inplace(&mut src)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
        resizer
            .resize(&src, dst, &options)
            .map_err(|e| format!("fir resize error: {e:?}"))?;
        mul_div
            .divide_alpha_inplace(dst)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
        return Ok(());
    }

    let region = image.backing_region();
    let src = fir::images::ImageRef::new(
        region.full_width,
        region.full_height,
        region.bytes,
        PixelType::U8x4,
    )
    .map_err(|e| format!("fir source image error: {e:?}"))?;
    let options = options.crop(
        region.x as f64,
        region.y as f64,
        image.width() as f64,
        image.height() as f64,
    );
    resizer
        .resize(&src, dst, &options)
        .map_err(|e| format!("fir resize error: {e:?}"))
}

fn resize_with_image_crate(
    image: &StaticImage,
    (width, height): (u32, u32),
    quality: ResizeQuality,
) -> std::result::Result<Vec<u8>, String> {
    let mut pixels = Vec::with_capacity(image.info().byte_size().map_err(|e| e.to_string())?);
    for row in image.rows() {
        pixels.extend_from_slice(row);
    }
    let rgba = RgbaImage::from_raw(image.width(), image.height(), pixels)
        .ok_or_else(|| "failed to build rgba image for fallback resize".to_string())?;
    Ok(image::imageops::resize(&rgba, width, height, fallback_filter(quality)).into_raw())
}

fn resize_u8(
    image: &StaticImage,
    (width, height): (u32, u32),
    quality: ResizeQuality,
) -> Result<StaticImage> {
    let options = ResizeOptions::new().resize_alg(resize_alg(quality));
    let mut dst = fir::images::Image::new(width, height, PixelType::U8x4);
    let pixels = match resize_with_fir(image, &mut dst, options) {
        Ok(()) => dst.into_vec(),
        Err(err) => {
            debug!(target: "image_bitmap::pipeline", %err, "fir resize failed, using image crate");
            resize_with_image_crate(image, (width, height), quality).map_err(|fallback| {
                BitmapError::resize_failed(
                    image.size(),
                    (width, height),
                    format!("{err}; image crate fallback failed: {fallback}"),
                )
            })?
        }
    };
    StaticImage::from_raster(image.info().with_size(width, height), pixels)
}

// Half floats are widened to F32x4 for the resize and narrowed afterwards.
fn resize_f16(
    image: &StaticImage,
    (width, height): (u32, u32),
    quality: ResizeQuality,
) -> Result<StaticImage> {
    let straight = image.alpha_type() == AlphaType::Unpremultiplied;
    let mut src = fir::images::Image::new(image.width(), image.height(), PixelType::F32x4);
    let wide_row_bytes = image.width() as usize * 16;
    for (y, wide_row) in src.buffer_mut().chunks_exact_mut(wide_row_bytes).enumerate() {
        for (px, out) in image
            .row(y as u32)
            .chunks_exact(8)
            .zip(wide_row.chunks_exact_mut(16))
        {
            let mut v = load_pixel(PixelFormat::RgbaF16, px);
            if straight {
                v = [v[0] * v[3], v[1] * v[3], v[2] * v[3], v[3]];
            }
            for (c, bytes) in v.iter().zip(out.chunks_exact_mut(4)) {
                bytes.copy_from_slice(&c.to_ne_bytes());
            }
        }
    }

    let mut dst = fir::images::Image::new(width, height, PixelType::F32x4);
    fir::Resizer::new()
        .resize(&src, &mut dst, &ResizeOptions::new().resize_alg(resize_alg(quality)))
        .map_err(|e| {
            BitmapError::resize_failed(image.size(), (width, height), format!("fir resize error: {e:?}"))
        })?;

    let dst_info = image.info().with_size(width, height);
    let mut pixels = allocate_pixels(&dst_info)?;
    for (wide, out) in dst.buffer().chunks_exact(16).zip(pixels.chunks_exact_mut(8)) {
        let mut v = [0.0f32; 4];
        for (c, b) in v.iter_mut().zip(wide.chunks_exact(4)) {
            *c = f32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
        }
        if straight {
            v = if v[3] > 0.0 {
                [v[0] / v[3], v[1] / v[3], v[2] / v[3], v[3]]
            } else {
                [0.0; 4]
            };
        }
        store_pixel(PixelFormat::RgbaF16, v, out);
    }
    StaticImage::from_raster(dst_info, pixels)
}
