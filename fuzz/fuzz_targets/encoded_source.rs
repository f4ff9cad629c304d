#![no_main]

use image_bitmap::{create_image_bitmap, BitmapSource, ImageBitmapOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let options = ImageBitmapOptions::new().premultiply_alpha("none");
    let _ = create_image_bitmap(BitmapSource::encoded(data.to_vec(), true), None, &options);
});
