// src/engine/bitmap.rs
//
// ImageBitmap: the result container. Owns at most one image; once closed or
// transferred it is neutered and reports a zero size.

use crate::engine::alpha::get_image_with_alpha_disposition;
use crate::engine::color::{CanvasColorParams, ColorSpace, PixelFormat};
use crate::engine::image::{AlphaType, ImageInfo, StaticImage};
use crate::error::{BitmapError, Result};
use crate::ops::{AlphaDisposition, U8ColorType};

#[derive(Debug, Default)]
pub struct ImageBitmap {
    image: Option<StaticImage>,
    origin_clean: bool,
    neutered: bool,
}

impl ImageBitmap {
    pub(crate) fn new(image: StaticImage, origin_clean: bool) -> Self {
        Self {
            image: Some(image),
            origin_clean,
            neutered: false,
        }
    }

    /// A bitmap without pixels. Every query reports zero or empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a bitmap from a verbatim copy of `data`, laid out as described.
    pub fn from_raw_pixels(
        data: &[u8],
        width: u32,
        height: u32,
        premultiplied: bool,
        origin_clean: bool,
        color_params: CanvasColorParams,
    ) -> Result<Self> {
        let alpha = if premultiplied {
            AlphaType::Premultiplied
        } else {
            AlphaType::Unpremultiplied
        };
        let info = ImageInfo::new(
            width,
            height,
            color_params.pixel_format,
            alpha,
            Some(color_params.color_space),
        );
        let expected = info.byte_size()?;
        if data.len() != expected {
            return Err(BitmapError::invalid_pixel_data(
                expected as u64,
                data.len() as u64,
            ));
        }
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(expected)
            .map_err(|_| BitmapError::allocation_failed(width, height, expected as u64))?;
        pixels.extend_from_slice(data);
        Ok(Self::new(StaticImage::from_raster(info, pixels)?, origin_clean))
    }

    pub fn width(&self) -> u32 {
        self.image.as_ref().map_or(0, StaticImage::width)
    }

    pub fn height(&self) -> u32 {
        self.image.as_ref().map_or(0, StaticImage::height)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn is_neutered(&self) -> bool {
        self.neutered
    }

    pub fn origin_clean(&self) -> bool {
        self.origin_clean
    }

    pub fn is_accelerated(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(StaticImage::is_texture_backed)
    }

    pub fn is_premultiplied(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(|image| image.alpha_type() == AlphaType::Premultiplied)
    }

    pub fn color_params(&self) -> CanvasColorParams {
        self.image.as_ref().map_or_else(CanvasColorParams::default, |image| {
            CanvasColorParams::new(
                image.color_space().unwrap_or(ColorSpace::Srgb),
                image.pixel_format(),
            )
        })
    }

    pub fn image(&self) -> Option<&StaticImage> {
        self.image.as_ref()
    }

    /// Release the pixels. Idempotent.
    pub fn close(&mut self) {
        self.image = None;
        self.neutered = true;
    }

    /// Move the pixels out, leaving this bitmap neutered.
    pub fn transfer(&mut self) -> Result<StaticImage> {
        if self.neutered {
            return Err(BitmapError::neutered());
        }
        let image = self
            .image
            .take()
            .ok_or_else(|| BitmapError::source_unavailable("bitmap has no pixels"))?;
        self.neutered = true;
        Ok(image)
    }

    fn live_image(&self) -> Result<&StaticImage> {
        if self.neutered {
            return Err(BitmapError::neutered());
        }
        self.image
            .as_ref()
            .ok_or_else(|| BitmapError::source_unavailable("bitmap has no pixels"))
    }

    /// Copy of the pixels with the requested alpha type.
    ///
    /// F16 bitmaps copy out as F16; `color_type` picks the channel order of
    /// 8-bit bitmaps only.
    pub fn copy_bitmap_data(
        &self,
        disposition: AlphaDisposition,
        color_type: U8ColorType,
    ) -> Result<Vec<u8>> {
        let image = self.live_image()?;
        let alpha = match disposition {
            AlphaDisposition::Premultiply => AlphaType::Premultiplied,
            AlphaDisposition::Unpremultiply => AlphaType::Unpremultiplied,
            AlphaDisposition::DontChange => return Err(BitmapError::invalid_alpha_disposition()),
        };
        let info = image.info().with_alpha_type(alpha);
        let mut pixels = image.read_pixels(&info)?;
        if info.format == PixelFormat::Rgba8 && color_type == U8ColorType::Bgra {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        Ok(pixels)
    }

    /// Copy of the pixels exactly as stored.
    pub fn copy_bitmap_data_raw(&self) -> Result<Vec<u8>> {
        let image = self.live_image()?;
        image.read_pixels(image.info())
    }

    /// Premultiplied copy for drawing onto a canvas.
    pub fn source_image_for_canvas(&self) -> Result<StaticImage> {
        let copy = self.live_image()?.try_clone()?;
        get_image_with_alpha_disposition(copy, AlphaDisposition::Premultiply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(premultiplied: bool) -> ImageBitmap {
        ImageBitmap::from_raw_pixels(
            &[200, 100, 50, 128, 1, 2, 3, 255],
            2,
            1,
            premultiplied,
            true,
            CanvasColorParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn raw_pixels_are_copied_verbatim() {
        let bmp = bitmap(false);
        assert_eq!(bmp.size(), (2, 1));
        assert!(!bmp.is_premultiplied());
        assert_eq!(bmp.copy_bitmap_data_raw().unwrap(), vec![200, 100, 50, 128, 1, 2, 3, 255]);
        assert_eq!(bmp.color_params().color_space, ColorSpace::Srgb);
    }

    #[test]
    fn raw_pixels_reject_wrong_length() {
        let err = ImageBitmap::from_raw_pixels(&[0; 5], 1, 1, true, true, CanvasColorParams::default())
            .unwrap_err();
        assert!(matches!(err, BitmapError::InvalidPixelData { expected: 4, actual: 5 }));
    }

    #[test]
    fn copy_with_disposition_and_swizzle() {
        let bmp = bitmap(false);
        let premul = bmp
            .copy_bitmap_data(AlphaDisposition::Premultiply, U8ColorType::Rgba)
            .unwrap();
        assert_eq!(premul[..4], [100, 50, 25, 128]);
        let bgra = bmp
            .copy_bitmap_data(AlphaDisposition::Unpremultiply, U8ColorType::Bgra)
            .unwrap();
        assert_eq!(bgra, vec![50, 100, 200, 128, 3, 2, 1, 255]);
        assert!(bmp
            .copy_bitmap_data(AlphaDisposition::DontChange, U8ColorType::Rgba)
            .is_err());
    }

    #[test]
    fn f16_bitmap_copies_out_at_full_precision() {
        let params = CanvasColorParams::new(ColorSpace::DisplayP3, PixelFormat::RgbaF16);
        // One opaque pixel, red = 0.3 in half floats.
        let mut px = Vec::new();
        for v in [0.3f32, 0.0, 0.0, 1.0] {
            px.extend_from_slice(&half::f16::from_f32(v).to_le_bytes());
        }
        let bmp = ImageBitmap::from_raw_pixels(&px, 1, 1, true, true, params).unwrap();
        for color_type in [U8ColorType::Rgba, U8ColorType::Bgra] {
            let copy = bmp
                .copy_bitmap_data(AlphaDisposition::Premultiply, color_type)
                .unwrap();
            assert_eq!(copy.len(), 8);
            assert_eq!(copy, px);
        }
    }

    #[test]
    fn close_neuters() {
        let mut bmp = bitmap(true);
        bmp.close();
        assert!(bmp.is_neutered());
        assert_eq!(bmp.size(), (0, 0));
        assert!(matches!(bmp.copy_bitmap_data_raw(), Err(BitmapError::Neutered)));
        bmp.close();
        assert!(bmp.is_neutered());
    }

    #[test]
    fn transfer_moves_pixels_once() {
        let mut bmp = bitmap(true);
        let image = bmp.transfer().unwrap();
        assert_eq!(image.size(), (2, 1));
        assert!(bmp.is_neutered());
        assert_eq!(bmp.width(), 0);
        assert!(matches!(bmp.transfer(), Err(BitmapError::Neutered)));
    }

    #[test]
    fn canvas_image_is_premultiplied() {
        let bmp = bitmap(false);
        let image = bmp.source_image_for_canvas().unwrap();
        assert_eq!(image.alpha_type(), AlphaType::Premultiplied);
        assert_eq!(image.row(0)[..4], [100, 50, 25, 128]);
        // The bitmap itself is untouched.
        assert!(!bmp.is_premultiplied());
    }

    #[test]
    fn empty_bitmap_reports_zero() {
        let bmp = ImageBitmap::empty();
        assert_eq!(bmp.size(), (0, 0));
        assert!(!bmp.is_accelerated());
        assert!(!bmp.is_neutered());
        assert!(bmp.copy_bitmap_data_raw().is_err());
    }
}
