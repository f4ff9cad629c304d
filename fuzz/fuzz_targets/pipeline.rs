#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use image_bitmap::{create_image_bitmap, BitmapSource, ImageBitmapOptions, IntRect};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Request {
    width: u8,
    height: u8,
    image_data: bool,
    flip: bool,
    premultiply: u8,
    color: u8,
    quality: u8,
    resize: Option<(u8, u8)>,
    crop: Option<(i16, i16, i16, i16)>,
}

fn build_options(request: &Request) -> ImageBitmapOptions {
    let premultiply = ["default", "premultiply", "none"][request.premultiply as usize % 3];
    let color = ["default", "none", "srgb", "linear-rgb", "p3", "rec2020"][request.color as usize % 6];
    let quality = ["low", "medium", "high", "pixelated"][request.quality as usize % 4];
    let mut options = ImageBitmapOptions::new()
        .image_orientation(if request.flip { "flip-y" } else { "none" })
        .premultiply_alpha(premultiply)
        .color_space_conversion(color)
        .resize_quality(quality);
    if let Some((w, h)) = request.resize {
        // Zero means "omitted" so one-sided resizes get exercised too.
        options.resize_width = (w > 0).then_some(w as u32);
        options.resize_height = (h > 0).then_some(h as u32);
    }
    options
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let request = match Request::arbitrary(&mut unstructured) {
        Ok(request) => request,
        Err(_) => return,
    };
    let width = request.width as u32 % 48 + 1;
    let height = request.height as u32 % 48 + 1;
    let pixels: Vec<u8> = (0..width * height * 4)
        .map(|i| unstructured.arbitrary::<u8>().unwrap_or(i as u8))
        .collect();

    let source = if request.image_data {
        BitmapSource::image_data(pixels, width, height)
    } else {
        BitmapSource::RawPixels {
            data: pixels,
            width,
            height,
            origin_clean: true,
        }
    };
    let crop = request
        .crop
        .map(|(x, y, w, h)| IntRect::new(x as i32, y as i32, w as i32 % 256, h as i32 % 256));
    let options = build_options(&request);

    // Invalid requests may error; only panics and bad sizes matter here.
    if let Ok(bitmap) = create_image_bitmap(source, crop, &options) {
        let (w, h) = bitmap.size();
        assert!(w > 0 && h > 0);
        let bytes = bitmap.copy_bitmap_data_raw().unwrap_or_default();
        assert_eq!(bytes.len() as u64, w as u64 * h as u64 * bitmap.color_params().bytes_per_pixel() as u64);
    }
});
