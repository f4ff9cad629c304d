#![no_main]

use arbitrary::Arbitrary;
use image_bitmap::engine::{check_buffer_sizes, parse_options};
use image_bitmap::{ImageBitmapOptions, IntRect};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    orientation: String,
    premultiply: String,
    color: String,
    quality: String,
    resize_width: Option<u32>,
    resize_height: Option<u32>,
    crop: Option<(i32, i32, i32, i32)>,
    source: (u32, u32),
    straight: bool,
}

fuzz_target!(|input: Input| {
    let options = ImageBitmapOptions {
        image_orientation: input.orientation.into(),
        premultiply_alpha: input.premultiply.into(),
        color_space_conversion: input.color.into(),
        resize_width: input.resize_width,
        resize_height: input.resize_height,
        resize_quality: input.quality.into(),
    };
    let crop = input.crop.map(|(x, y, w, h)| IntRect::new(x, y, w, h));
    if let Ok(parsed) = parse_options(&options, crop, input.source, input.straight) {
        assert!(parsed.crop_rect.width > 0 && parsed.crop_rect.height > 0);
        let _ = check_buffer_sizes(&parsed);
    }
});
