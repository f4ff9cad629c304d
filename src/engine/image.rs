// src/engine/image.rs
//
// Internal image representation shared by every pipeline stage.
//
// A StaticImage owns exactly one backing store (host raster memory or a
// texture-backed store) and is move-only: stages take it by value and hand
// back a new one. `make_subset` is a zero-copy view; every reader goes
// through `row()` so the view is honored everywhere.

use crate::engine::color::{ColorSpace, PixelFormat};
use crate::error::{BitmapError, Result};
use crate::ops::IntRect;
use half::f16;
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlphaType {
    Premultiplied,
    Unpremultiplied,
}

/// Dimensions + storage description of a pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub alpha: AlphaType,
    pub color_space: Option<ColorSpace>,
}

impl ImageInfo {
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        alpha: AlphaType,
        color_space: Option<ColorSpace>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            alpha,
            color_space,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel() as usize
    }

    pub fn min_row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total byte size, or an overflow error if it does not fit in memory.
    pub fn byte_size(&self) -> Result<usize> {
        (self.width as u64)
            .checked_mul(self.height as u64)
            .and_then(|pixels| pixels.checked_mul(self.format.bytes_per_pixel() as u64))
            .filter(|bytes| *bytes <= isize::MAX as u64)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| {
                BitmapError::buffer_size_overflow(
                    self.width,
                    self.height,
                    self.format.bytes_per_pixel(),
                )
            })
    }

    pub fn with_alpha_type(&self, alpha: AlphaType) -> Self {
        Self { alpha, ..*self }
    }

    pub fn with_color_space(&self, color_space: Option<ColorSpace>) -> Self {
        Self {
            color_space,
            ..*self
        }
    }

    pub fn with_pixel_format(&self, format: PixelFormat) -> Self {
        Self { format, ..*self }
    }

    pub fn with_size(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..*self
        }
    }
}

/// Allocate a zeroed pixel buffer for `info`, failing instead of aborting.
pub fn allocate_pixels(info: &ImageInfo) -> Result<Vec<u8>> {
    let bytes = info.byte_size()?;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(bytes)
        .map_err(|_| BitmapError::allocation_failed(info.width, info.height, bytes as u64))?;
    pixels.resize(bytes, 0);
    Ok(pixels)
}

enum Backing {
    Raster(Vec<u8>),
    /// Pixels living on the GPU side; host access is a readback.
    Texture(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Raster(bytes) | Backing::Texture(bytes) => bytes,
        }
    }
}

pub(crate) struct BackingRegion<'a> {
    pub bytes: &'a [u8],
    pub full_width: u32,
    pub full_height: u32,
    pub x: u32,
    pub y: u32,
}

pub struct StaticImage {
    info: ImageInfo,
    backing: Backing,
    row_stride: usize,
    offset: usize,
    encoded: Option<Arc<[u8]>>,
    // Pixels are immutable once wrapped, so one alpha scan serves every stage.
    opaque: OnceCell<bool>,
}

impl fmt::Debug for StaticImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticImage")
            .field("info", &self.info)
            .field("texture_backed", &self.is_texture_backed())
            .field("subset", &self.is_subset())
            .field("encoded_bytes", &self.encoded.as_ref().map(|e| e.len()))
            .finish()
    }
}

impl StaticImage {
    /// Wrap a tightly packed host buffer.
    pub fn from_raster(info: ImageInfo, pixels: Vec<u8>) -> Result<Self> {
        Self::with_backing(info, pixels, Backing::Raster)
    }

    /// Wrap a tightly packed buffer that stands for accelerated (texture) storage.
    pub fn from_texture(info: ImageInfo, pixels: Vec<u8>) -> Result<Self> {
        Self::with_backing(info, pixels, Backing::Texture)
    }

    fn with_backing(
        info: ImageInfo,
        pixels: Vec<u8>,
        backing: impl FnOnce(Vec<u8>) -> Backing,
    ) -> Result<Self> {
        let expected = info.byte_size()?;
        if pixels.len() != expected {
            return Err(BitmapError::invalid_pixel_data(
                expected as u64,
                pixels.len() as u64,
            ));
        }
        Ok(Self {
            row_stride: info.min_row_bytes(),
            info,
            backing: backing(pixels),
            offset: 0,
            encoded: None,
            opaque: OnceCell::new(),
        })
    }

    /// Attach the original encoded bytes so later stages can re-decode.
    pub fn with_encoded_data(mut self, encoded: Arc<[u8]>) -> Self {
        self.encoded = Some(encoded);
        self
    }

    pub fn encoded_data(&self) -> Option<&Arc<[u8]>> {
        self.encoded.as_ref()
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    /// Pixel count of the visible region.
    pub fn area(&self) -> u64 {
        self.info.width as u64 * self.info.height as u64
    }

    pub fn bounds(&self) -> IntRect {
        IntRect::from_size(self.info.width, self.info.height)
    }

    pub fn alpha_type(&self) -> AlphaType {
        self.info.alpha
    }

    pub fn color_space(&self) -> Option<ColorSpace> {
        self.info.color_space
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.info.format
    }

    pub fn is_texture_backed(&self) -> bool {
        matches!(self.backing, Backing::Texture(_))
    }

    pub fn is_subset(&self) -> bool {
        self.offset != 0
            || self.row_stride != self.info.min_row_bytes()
            || self.backing.bytes().len() != self.row_stride * self.info.height as usize
    }

    /// Bytes of row `y` of the visible region.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = self.offset + y as usize * self.row_stride;
        &self.backing.bytes()[start..start + self.info.min_row_bytes()]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.info.height).map(move |y| self.row(y))
    }

    /// Log host access to texture-backed pixels.
    pub fn note_readback(&self) {
        if self.is_texture_backed() {
            debug!(
                target: "image_bitmap::readback",
                width = self.info.width,
                height = self.info.height,
                "texture readback"
            );
        }
    }

    /// The tightly packed store behind this image and where the visible
    /// region sits inside it.
    pub(crate) fn backing_region(&self) -> BackingRegion<'_> {
        let bytes = self.backing.bytes();
        let bpp = self.info.bytes_per_pixel();
        let stride = self.row_stride.max(1);
        BackingRegion {
            bytes,
            full_width: (self.row_stride / bpp) as u32,
            full_height: (bytes.len() / stride) as u32,
            x: ((self.offset % stride) / bpp) as u32,
            y: (self.offset / stride) as u32,
        }
    }

    /// True when every pixel is fully opaque. Scanned once, then cached.
    pub fn is_opaque(&self) -> bool {
        *self.opaque.get_or_init(|| self.scan_opaque())
    }

    fn scan_opaque(&self) -> bool {
        match self.info.format {
            PixelFormat::Rgba8 => self
                .rows()
                .all(|row| row.chunks_exact(4).all(|px| px[3] == u8::MAX)),
            PixelFormat::RgbaF16 => self.rows().all(|row| {
                row.chunks_exact(8)
                    .all(|px| f16::from_le_bytes([px[6], px[7]]).to_f32() >= 1.0)
            }),
        }
    }

    /// Zero-copy view of `rect`, which must lie inside the current bounds.
    pub fn make_subset(mut self, rect: IntRect) -> Result<Self> {
        let inside = !rect.is_empty()
            && rect.x >= 0
            && rect.y >= 0
            && rect.max_x() <= self.info.width as i64
            && rect.max_y() <= self.info.height as i64;
        if !inside {
            return Err(BitmapError::invalid_argument(
                "subset",
                format!("{rect:?}"),
                format!(
                    "must lie inside {}x{} image bounds",
                    self.info.width, self.info.height
                ),
            ));
        }
        self.offset += rect.y as usize * self.row_stride + rect.x as usize * self.info.bytes_per_pixel();
        self.info = self.info.with_size(rect.width as u32, rect.height as u32);
        // An opaque image has opaque subsets; anything else needs a fresh scan.
        if self.opaque.get() != Some(&true) {
            self.opaque = OnceCell::new();
        }
        Ok(self)
    }

    /// Relabel the color space without touching pixels.
    pub fn retagged(mut self, color_space: Option<ColorSpace>) -> Self {
        self.info.color_space = color_space;
        self
    }

    /// Copy pixels out into a host buffer laid out as `dst`.
    ///
    /// Converts pixel format and alpha type. Values stay in the stored
    /// (gamma-encoded) space; the color space of `dst` is a label only.
    pub fn read_pixels(&self, dst: &ImageInfo) -> Result<Vec<u8>> {
        if dst.is_empty() || self.info.is_empty() {
            return Err(BitmapError::invalid_argument(
                "read_pixels",
                format!("{}x{}", dst.width, dst.height),
                "cannot read back an empty image",
            ));
        }
        if (dst.width, dst.height) != self.size() {
            return Err(BitmapError::invalid_argument(
                "read_pixels",
                format!("{}x{}", dst.width, dst.height),
                format!(
                    "destination must match {}x{} source",
                    self.info.width, self.info.height
                ),
            ));
        }
        self.note_readback();
        let mut pixels = allocate_pixels(dst)?;
        let dst_row_bytes = dst.min_row_bytes();
        pixels
            .par_chunks_mut(dst_row_bytes)
            .enumerate()
            .for_each(|(y, dst_row)| {
                convert_row(
                    self.row(y as u32),
                    self.info.format,
                    self.info.alpha,
                    dst_row,
                    dst.format,
                    dst.alpha,
                );
            });
        Ok(pixels)
    }

    /// Take the pixels as one tightly packed host buffer.
    ///
    /// Moves the buffer out when the image already is one; copies the
    /// visible rows of a subset view.
    pub fn into_compact_pixels(self) -> Result<(ImageInfo, Vec<u8>)> {
        self.note_readback();
        if !self.is_subset() {
            let bytes = match self.backing {
                Backing::Raster(bytes) | Backing::Texture(bytes) => bytes,
            };
            return Ok((self.info, bytes));
        }
        let mut pixels = allocate_pixels(&self.info)?;
        let row_bytes = self.info.min_row_bytes();
        if row_bytes > 0 {
            for (y, dst_row) in pixels.chunks_exact_mut(row_bytes).enumerate() {
                dst_row.copy_from_slice(self.row(y as u32));
            }
        }
        Ok((self.info, pixels))
    }

    /// Deep copy of the visible region, keeping backing kind and encoded data.
    pub fn try_clone(&self) -> Result<Self> {
        let mut pixels = allocate_pixels(&self.info)?;
        let row_bytes = self.info.min_row_bytes();
        if row_bytes > 0 {
            for (y, dst_row) in pixels.chunks_exact_mut(row_bytes).enumerate() {
                dst_row.copy_from_slice(self.row(y as u32));
            }
        }
        let copy = if self.is_texture_backed() {
            Self::from_texture(self.info, pixels)?
        } else {
            Self::from_raster(self.info, pixels)?
        };
        Ok(match &self.encoded {
            Some(encoded) => copy.with_encoded_data(Arc::clone(encoded)),
            None => copy,
        })
    }
}

// =============================================================================
// PIXEL ACCESS
// =============================================================================

#[inline]
pub fn premultiply_u8(channel: u8, alpha: u8) -> u8 {
    ((channel as u32 * alpha as u32 + 127) / 255) as u8
}

#[inline]
pub fn unpremultiply_u8(channel: u8, alpha: u8) -> u8 {
    if alpha == 0 {
        return 0;
    }
    let value = (channel as u32 * 255 + alpha as u32 / 2) / alpha as u32;
    value.min(255) as u8
}

/// Load one pixel as normalized floats in stored (encoded) space.
pub fn load_pixel(format: PixelFormat, px: &[u8]) -> [f32; 4] {
    match format {
        PixelFormat::Rgba8 => [
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
            px[3] as f32 / 255.0,
        ],
        PixelFormat::RgbaF16 => [
            f16::from_le_bytes([px[0], px[1]]).to_f32(),
            f16::from_le_bytes([px[2], px[3]]).to_f32(),
            f16::from_le_bytes([px[4], px[5]]).to_f32(),
            f16::from_le_bytes([px[6], px[7]]).to_f32(),
        ],
    }
}

pub fn store_pixel(format: PixelFormat, value: [f32; 4], out: &mut [u8]) {
    match format {
        PixelFormat::Rgba8 => {
            for (dst, v) in out.iter_mut().zip(value) {
                *dst = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
        PixelFormat::RgbaF16 => {
            for (dst, v) in out.chunks_exact_mut(2).zip(value) {
                dst.copy_from_slice(&f16::from_f32(v).to_le_bytes());
            }
        }
    }
}

/// Convert one row between formats and alpha types.
pub fn convert_row(
    src: &[u8],
    src_format: PixelFormat,
    src_alpha: AlphaType,
    dst: &mut [u8],
    dst_format: PixelFormat,
    dst_alpha: AlphaType,
) {
    if src_format == dst_format && src_alpha == dst_alpha {
        dst.copy_from_slice(&src[..dst.len()]);
        return;
    }

    if src_format == PixelFormat::Rgba8 && dst_format == PixelFormat::Rgba8 {
        for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
            let alpha = s[3];
            let op = match dst_alpha {
                AlphaType::Premultiplied => premultiply_u8,
                AlphaType::Unpremultiplied => unpremultiply_u8,
            };
            d[0] = op(s[0], alpha);
            d[1] = op(s[1], alpha);
            d[2] = op(s[2], alpha);
            d[3] = alpha;
        }
        return;
    }

    let src_bpp = src_format.bytes_per_pixel() as usize;
    let dst_bpp = dst_format.bytes_per_pixel() as usize;
    for (s, d) in src.chunks_exact(src_bpp).zip(dst.chunks_exact_mut(dst_bpp)) {
        let mut px = load_pixel(src_format, s);
        if src_alpha != dst_alpha {
            let alpha = px[3];
            match dst_alpha {
                AlphaType::Premultiplied => {
                    px[0] *= alpha;
                    px[1] *= alpha;
                    px[2] *= alpha;
                }
                AlphaType::Unpremultiplied => {
                    if alpha > 0.0 {
                        px[0] /= alpha;
                        px[1] /= alpha;
                        px[2] /= alpha;
                    } else {
                        px = [0.0, 0.0, 0.0, 0.0];
                    }
                }
            }
        }
        store_pixel(dst_format, px, d);
    }
}

// =============================================================================
// SURFACE
// =============================================================================

/// Drawable raster surface. Surfaces always hold premultiplied pixels.
pub struct Surface {
    info: ImageInfo,
    pixels: Vec<u8>,
}

impl Surface {
    /// Allocate a transparent surface; fails instead of aborting on OOM.
    pub fn new_raster(
        width: u32,
        height: u32,
        format: PixelFormat,
        color_space: Option<ColorSpace>,
    ) -> Result<Self> {
        let info = ImageInfo::new(width, height, format, AlphaType::Premultiplied, color_space);
        if info.is_empty() {
            return Err(BitmapError::invalid_argument(
                "surface",
                format!("{width}x{height}"),
                "surface dimensions must be non-zero",
            ));
        }
        let pixels = allocate_pixels(&info)?;
        Ok(Self { info, pixels })
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Draw `image` at the origin with a copy ("source") blend.
    ///
    /// Pixels are converted to the surface format and premultiplied; no
    /// compositing with existing content happens. With `flip_y` the image
    /// is mirrored about the surface's horizontal midline.
    pub fn draw_image(&mut self, image: &StaticImage, flip_y: bool) {
        let surface_height = self.info.height;
        let cols = self.info.width.min(image.width()) as usize;
        let src_bpp = image.info().bytes_per_pixel();
        let dst_bpp = self.info.bytes_per_pixel();
        let dst_format = self.info.format;
        let row_bytes = self.info.min_row_bytes();
        self.pixels
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(dst_y, dst_row)| {
                let dst_y = dst_y as u32;
                let src_y = if flip_y {
                    surface_height - 1 - dst_y
                } else {
                    dst_y
                };
                if src_y >= image.height() {
                    return;
                }
                convert_row(
                    &image.row(src_y)[..cols * src_bpp],
                    image.pixel_format(),
                    image.alpha_type(),
                    &mut dst_row[..cols * dst_bpp],
                    dst_format,
                    AlphaType::Premultiplied,
                );
            });
    }

    pub fn snapshot(self) -> Result<StaticImage> {
        StaticImage::from_raster(self.info, self.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_info(width: u32, height: u32, alpha: AlphaType) -> ImageInfo {
        ImageInfo::new(width, height, PixelFormat::Rgba8, alpha, Some(ColorSpace::Srgb))
    }

    fn numbered(width: u32, height: u32) -> StaticImage {
        let pixels = (0..width * height)
            .flat_map(|i| [i as u8, (i * 2) as u8, (i * 3) as u8, 255])
            .collect();
        StaticImage::from_raster(rgba_info(width, height, AlphaType::Premultiplied), pixels)
            .unwrap()
    }

    #[test]
    fn from_raster_rejects_wrong_length() {
        let err = StaticImage::from_raster(rgba_info(2, 2, AlphaType::Premultiplied), vec![0; 15])
            .unwrap_err();
        assert!(matches!(err, BitmapError::InvalidPixelData { expected: 16, actual: 15 }));
    }

    #[test]
    fn subset_is_a_view_over_the_same_rows() {
        let img = numbered(4, 4);
        let sub = img.make_subset(IntRect::new(1, 2, 2, 2)).unwrap();
        assert!(sub.is_subset());
        assert_eq!(sub.size(), (2, 2));
        // pixel (1,2) has index 9
        assert_eq!(&sub.row(0)[0..4], &[9, 18, 27, 255]);
        let (info, pixels) = sub.into_compact_pixels().unwrap();
        assert_eq!((info.width, info.height), (2, 2));
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[8..12], &[13, 26, 39, 255]);
    }

    #[test]
    fn subset_outside_bounds_is_rejected() {
        let img = numbered(4, 4);
        assert!(img.make_subset(IntRect::new(3, 3, 2, 2)).is_err());
    }

    #[test]
    fn premultiply_unpremultiply_u8_opaque_is_identity() {
        for c in 0..=255u8 {
            assert_eq!(premultiply_u8(c, 255), c);
            assert_eq!(unpremultiply_u8(c, 255), c);
        }
        assert_eq!(unpremultiply_u8(10, 0), 0);
    }

    #[test]
    fn read_pixels_converts_alpha() {
        let img = StaticImage::from_raster(
            rgba_info(1, 1, AlphaType::Unpremultiplied),
            vec![200, 100, 50, 128],
        )
        .unwrap();
        let out = img
            .read_pixels(&rgba_info(1, 1, AlphaType::Premultiplied))
            .unwrap();
        assert_eq!(out, vec![100, 50, 25, 128]);
    }

    #[test]
    fn read_pixels_to_f16_and_back() {
        let img = numbered(2, 1);
        let f16_info = img.info().with_pixel_format(PixelFormat::RgbaF16);
        let wide = img.read_pixels(&f16_info).unwrap();
        assert_eq!(wide.len(), 16);
        let wide_img = StaticImage::from_raster(f16_info, wide).unwrap();
        let narrow = wide_img.read_pixels(img.info()).unwrap();
        assert_eq!(narrow, vec![0, 0, 0, 255, 1, 2, 3, 255]);
    }

    #[test]
    fn allocation_overflow_is_reported() {
        let info = ImageInfo::new(
            u32::MAX,
            u32::MAX,
            PixelFormat::RgbaF16,
            AlphaType::Premultiplied,
            None,
        );
        assert!(matches!(
            allocate_pixels(&info),
            Err(BitmapError::BufferSizeOverflow { .. })
        ));
    }

    #[test]
    fn surface_draw_flips_rows() {
        let img = numbered(1, 3);
        let mut surface = Surface::new_raster(1, 3, PixelFormat::Rgba8, Some(ColorSpace::Srgb))
            .unwrap();
        surface.draw_image(&img, true);
        let out = surface.snapshot().unwrap();
        assert_eq!(out.row(0), img.row(2));
        assert_eq!(out.row(2), img.row(0));
    }

    #[test]
    fn surface_draw_premultiplies() {
        let img = StaticImage::from_raster(
            rgba_info(1, 1, AlphaType::Unpremultiplied),
            vec![255, 255, 255, 0],
        )
        .unwrap();
        let mut surface = Surface::new_raster(1, 1, PixelFormat::Rgba8, None).unwrap();
        surface.draw_image(&img, false);
        let out = surface.snapshot().unwrap();
        assert_eq!(out.row(0), &[0, 0, 0, 0]);
        assert_eq!(out.alpha_type(), AlphaType::Premultiplied);
    }

    #[test]
    fn is_opaque_scans_alpha() {
        assert!(numbered(3, 3).is_opaque());
        let img = StaticImage::from_raster(
            rgba_info(1, 1, AlphaType::Premultiplied),
            vec![0, 0, 0, 254],
        )
        .unwrap();
        assert!(!img.is_opaque());
    }

    #[test]
    fn subset_rescans_opacity_of_translucent_parent() {
        // Left column translucent, right column opaque.
        let img = StaticImage::from_raster(
            rgba_info(2, 1, AlphaType::Premultiplied),
            vec![0, 0, 0, 10, 9, 9, 9, 255],
        )
        .unwrap();
        assert!(!img.is_opaque());
        let right = img.make_subset(IntRect::new(1, 0, 1, 1)).unwrap();
        assert!(right.is_opaque());
    }

    #[test]
    fn opaque_subset_keeps_cached_answer() {
        let img = numbered(4, 4);
        assert!(img.is_opaque());
        let sub = img.make_subset(IntRect::new(1, 1, 2, 2)).unwrap();
        assert_eq!(sub.opaque.get(), Some(&true));
        assert!(sub.is_opaque());
    }

    #[test]
    fn try_clone_copies_visible_region_only() {
        let sub = numbered(4, 4).make_subset(IntRect::new(2, 0, 2, 1)).unwrap();
        let copy = sub.try_clone().unwrap();
        assert!(!copy.is_subset());
        assert_eq!(copy.row(0), sub.row(0));
    }
}
