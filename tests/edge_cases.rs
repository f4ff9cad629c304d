// tests/edge_cases.rs
//
// Boundary values, degenerate inputs and error handling.

use image::{ImageFormat, RgbaImage};
use image_bitmap::engine::{
    check_dimensions, get_image_with_alpha_disposition_with_threshold, peek_dimensions,
    run_with_panic_policy, AlphaType, BitmapConfig, CanvasColorParams, ColorSpace, ImageBitmap,
    ImageInfo, PixelFormat, StaticImage, MAX_DIMENSION, MAX_PIXELS,
};
use image_bitmap::{
    create_image_bitmap, AlphaDisposition, BitmapError, BitmapSource, ErrorCategory,
    ImageBitmapOptions, IntRect,
};
use std::io::Cursor;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn straight(width: u32, height: u32, px: [u8; 4]) -> StaticImage {
    let info = ImageInfo::new(
        width,
        height,
        PixelFormat::Rgba8,
        AlphaType::Unpremultiplied,
        Some(ColorSpace::Srgb),
    );
    StaticImage::from_raster(info, px.repeat((width * height) as usize)).unwrap()
}

mod minimal_sources {
    use super::*;

    #[test]
    fn one_by_one_source() {
        let source = BitmapSource::image_data(vec![1, 2, 3, 4], 1, 1);
        let bitmap = create_image_bitmap(source, None, &ImageBitmapOptions::default()).unwrap();
        assert_eq!(bitmap.size(), (1, 1));
    }

    #[test]
    fn one_by_one_upscaled() {
        let source = BitmapSource::image_data(vec![50, 60, 70, 255], 1, 1);
        let options = ImageBitmapOptions::new().resize_width(7).resize_height(3);
        let bitmap = create_image_bitmap(source, None, &options).unwrap();
        assert_eq!(bitmap.size(), (7, 3));
        assert!(bitmap
            .copy_bitmap_data_raw()
            .unwrap()
            .chunks_exact(4)
            .all(|px| px == [50, 60, 70, 255]));
    }

    #[test]
    fn shrink_to_single_pixel() {
        let source = BitmapSource::image_data([128, 128, 128, 255].repeat(64 * 64), 64, 64);
        let options = ImageBitmapOptions::new()
            .resize_width(1)
            .resize_height(1)
            .resize_quality("high");
        let bitmap = create_image_bitmap(source, None, &options).unwrap();
        let px = bitmap.copy_bitmap_data_raw().unwrap();
        assert_eq!(px.len(), 4);
        assert!(px[0].abs_diff(128) <= 1);
    }

    #[test]
    fn zero_sized_canvas_is_invalid() {
        let info = ImageInfo::new(
            0,
            0,
            PixelFormat::Rgba8,
            AlphaType::Premultiplied,
            Some(ColorSpace::Srgb),
        );
        let snapshot = StaticImage::from_raster(info, Vec::new()).unwrap();
        let source = BitmapSource::Canvas {
            snapshot: Some(snapshot),
            status: Default::default(),
            origin_clean: true,
        };
        let err = create_image_bitmap(source, None, &ImageBitmapOptions::default()).unwrap_err();
        assert!(matches!(err, BitmapError::InvalidArgument { .. }));
        assert_eq!(err.category(), ErrorCategory::UserError);
    }
}

mod transparent_pixels {
    use super::*;

    #[test]
    fn fully_transparent_pixels_premultiply_to_zero() {
        let source = BitmapSource::image_data([255, 255, 255, 0].repeat(4), 2, 2);
        let bitmap = create_image_bitmap(source, None, &ImageBitmapOptions::default()).unwrap();
        assert!(bitmap.copy_bitmap_data_raw().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn readback_and_draw_strategies_agree() {
        let image = straight(32, 32, [200, 80, 40, 100]);
        let by_readback = get_image_with_alpha_disposition_with_threshold(
            image.try_clone().unwrap(),
            AlphaDisposition::Premultiply,
            u64::MAX,
        )
        .unwrap();
        let by_draw = get_image_with_alpha_disposition_with_threshold(
            image,
            AlphaDisposition::Premultiply,
            0,
        )
        .unwrap();
        assert_eq!(by_readback.alpha_type(), AlphaType::Premultiplied);
        assert_eq!(by_draw.alpha_type(), AlphaType::Premultiplied);
        for (a, b) in by_readback.rows().zip(by_draw.rows()) {
            for (x, y) in a.iter().zip(b) {
                assert!(x.abs_diff(*y) <= 1);
            }
        }
    }

    #[test]
    fn dont_change_is_rejected() {
        let err = get_image_with_alpha_disposition_with_threshold(
            straight(1, 1, [0; 4]),
            AlphaDisposition::DontChange,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, BitmapError::InvalidAlphaDisposition));
        assert!(!err.is_recoverable());
    }
}

mod wide_sources {
    use super::*;

    #[test]
    fn f16_internal_image_keeps_format_without_conversion() {
        let info = ImageInfo::new(
            2,
            2,
            PixelFormat::RgbaF16,
            AlphaType::Unpremultiplied,
            Some(ColorSpace::LinearSrgb),
        );
        let pixels = vec![0u8; info.byte_size().unwrap()];
        let source = BitmapSource::InternalImage {
            image: StaticImage::from_raster(info, pixels).unwrap(),
            origin_clean: true,
        };
        let options = ImageBitmapOptions::new().premultiply_alpha("none");
        let bitmap = create_image_bitmap(source, None, &options).unwrap();
        assert_eq!(
            bitmap.color_params(),
            CanvasColorParams::new(ColorSpace::LinearSrgb, PixelFormat::RgbaF16)
        );
        assert!(!bitmap.is_premultiplied());
    }

    #[test]
    fn raw_f16_bitmap_requires_exact_length() {
        let params = CanvasColorParams::new(ColorSpace::Rec2020, PixelFormat::RgbaF16);
        assert!(ImageBitmap::from_raw_pixels(&[0; 32], 2, 2, true, true, params).is_ok());
        let err = ImageBitmap::from_raw_pixels(&[0; 16], 2, 2, true, true, params).unwrap_err();
        assert!(matches!(
            err,
            BitmapError::InvalidPixelData {
                expected: 32,
                actual: 16
            }
        ));
    }
}

mod limits {
    use super::*;

    #[test]
    fn dimension_limits() {
        assert!(check_dimensions(MAX_DIMENSION, 1).is_ok());
        assert!(matches!(
            check_dimensions(MAX_DIMENSION + 1, 1),
            Err(BitmapError::DimensionExceedsLimit { .. })
        ));
        let side = (MAX_PIXELS as f64).sqrt() as u32 + 1;
        assert!(matches!(
            check_dimensions(side, side),
            Err(BitmapError::PixelCountExceedsLimit { .. })
        ));
    }

    #[test]
    fn header_is_read_without_decoding() {
        assert_eq!(peek_dimensions(&png_bytes(13, 9)).unwrap(), (13, 9));
        assert!(peek_dimensions(b"not an image").is_err());
    }

    #[test]
    fn crop_far_outside_i32_range_does_not_overflow() {
        let source = BitmapSource::image_data(vec![0; 16], 2, 2);
        let bitmap = create_image_bitmap(
            source,
            Some(IntRect::new(i32::MAX - 1, i32::MAX - 1, 2, 2)),
            &ImageBitmapOptions::default(),
        )
        .unwrap();
        assert_eq!(bitmap.size(), (2, 2));
    }

    #[test]
    fn config_lookup_ignores_garbage() {
        let config = BitmapConfig::from_lookup(|key| match key {
            "IMAGE_BITMAP_READBACK_THRESHOLD" => Some("lots".to_string()),
            "IMAGE_BITMAP_RASTER_THREADS" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config, BitmapConfig::default());

        let tuned = BitmapConfig::from_lookup(|key| match key {
            "IMAGE_BITMAP_READBACK_THRESHOLD" => Some(" 10 ".to_string()),
            "IMAGE_BITMAP_RASTER_THREADS" => Some("3".to_string()),
            _ => None,
        });
        assert_eq!(tuned.readback_threshold_pixels, 10);
        assert_eq!(tuned.raster_threads, 3);
    }
}

mod panics {
    use super::*;

    #[test]
    fn panic_becomes_internal_error() {
        let result: image_bitmap::Result<()> =
            run_with_panic_policy("test", || panic!("resampler blew up"));
        let err = result.unwrap_err();
        assert!(matches!(err, BitmapError::InternalPanic { .. }));
        assert_eq!(err.category(), ErrorCategory::InternalBug);
        assert!(err.to_string().contains("resampler blew up"));
    }
}

mod encoded {
    use super::*;

    #[test]
    fn encoded_png_crop_keeps_pixels() {
        let source = BitmapSource::encoded(png_bytes(20, 10), true);
        let bitmap = create_image_bitmap(
            source,
            Some(IntRect::new(5, 3, 4, 4)),
            &ImageBitmapOptions::default(),
        )
        .unwrap();
        assert_eq!(bitmap.size(), (4, 4));
        assert_eq!(&bitmap.copy_bitmap_data_raw().unwrap()[0..4], &[5, 3, 0, 255]);
    }

    #[test]
    fn bitmap_close_is_idempotent() {
        let mut bitmap = ImageBitmap::from_raw_pixels(
            &[0; 4],
            1,
            1,
            false,
            true,
            CanvasColorParams::default(),
        )
        .unwrap();
        bitmap.close();
        bitmap.close();
        assert!(bitmap.is_neutered());
        assert_eq!(bitmap.size(), (0, 0));
    }
}
