// lib.rs
//
// image-bitmap: ImageBitmap construction over raster buffers
//
// Design goals:
// - One pipeline for every source kind
// - No allocation before the buffer sizes are known to fit
// - Stages hand images over by value, nothing is shared between them
// - Async variant that rasterizes off the calling thread

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{
    create_image_bitmap, create_image_bitmap_async, create_image_bitmap_or_empty, BitmapPromise,
    BitmapSource, ExecutionContext, ImageBitmap, PromiseState,
};
pub use error::{BitmapError, ErrorCategory, Result};
pub use ops::{
    AlphaDisposition, ImageBitmapOptions, ImageOrientation, IntRect, PremultiplyAlpha,
    ResizeQuality, U8ColorType,
};

/// Get library version
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Encoded formats accepted for image element sources
pub fn supported_input_formats() -> Vec<String> {
    vec![
        "jpeg".to_string(),
        "jpg".to_string(),
        "png".to_string(),
        "webp".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn supported_formats_are_lowercase() {
        assert!(supported_input_formats()
            .iter()
            .all(|f| f.chars().all(|c| c.is_ascii_lowercase())));
    }
}
