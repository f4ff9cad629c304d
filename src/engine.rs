// src/engine.rs
//
// The core of image-bitmap. A source image goes through a fixed stage
// sequence (crop, shrink, flip, color, alpha, grow) and ends up in an
// ImageBitmap, synchronously or via the background raster pool.
//
// This file is a facade over the decomposed modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed decoded image dimension (width or height).
/// Larger encoded images are rejected before decoding to stop decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed decoded pixel count (width * height).
/// 100 megapixels = 400MB of RGBA8.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod alpha;
mod api;
mod bitmap;
mod color;
mod common;
mod config;
mod crop;
mod decoder;
mod flip;
mod guard;
mod image;
mod options;
mod pipeline;
mod pool;
mod record;
mod resample;
mod source;
mod tasks;

pub use alpha::{get_image_with_alpha_disposition, get_image_with_alpha_disposition_with_threshold};
pub use api::{
    create_image_bitmap, create_image_bitmap_from_bitmap, create_image_bitmap_or_empty, prepare,
};
pub use bitmap::ImageBitmap;
pub use color::{
    apply_color_space_conversion, convert_to_color_space, CanvasColorParams, ColorSpace,
    PixelFormat, TransferFunctionBehavior,
};
pub use common::run_with_panic_policy;
pub use config::{config, BitmapConfig, DEFAULT_READBACK_THRESHOLD_PIXELS};
pub use crop::{crop_image, make_blank_image, Cropped};
pub use decoder::{check_dimensions, decode, decode_element, peek_dimensions, ColorBehavior};
pub use flip::flip_image_vertically;
pub use guard::{check_buffer_sizes, dst_buffer_size_has_overflow};
pub use self::image::{AlphaType, ImageInfo, StaticImage, Surface};
pub use options::{parse_options, ParsedOptions};
pub use pipeline::{crop_and_convert, process, process_image_data};
pub use pool::{raster_pool, spawn_raster};
pub use record::{PaintOp, PaintRecord};
pub use resample::{is_downscale, scale_image};
pub use source::{BitmapSource, ElementContent, ResolvedSource, SourceImageStatus, SourceKind};
pub use tasks::{
    create_image_bitmap_async, promise_result, BitmapPromise, BitmapResolver, ExecutionContext,
    PromiseState, TaskRunner,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_leave_room_for_f16_buffers() {
        // A max-size decoded frame still has an addressable F16 byte count.
        let bytes = MAX_PIXELS * PixelFormat::RgbaF16.bytes_per_pixel() as u64;
        assert!(bytes < isize::MAX as u64);
        assert!((MAX_DIMENSION as u64) * (MAX_DIMENSION as u64) > MAX_PIXELS);
    }
}
