// src/engine/guard.rs
//
// Overflow Guard. Runs before any allocation: every later stage assumes the
// crop and resize buffers fit a 32-bit byte count.

use crate::engine::options::ParsedOptions;
use crate::error::{BitmapError, Result};

fn byte_count(width: u32, height: u32, bytes_per_pixel: u32) -> Option<u32> {
    width.checked_mul(height)?.checked_mul(bytes_per_pixel)
}

/// True when the crop buffer, or the resize buffer if scaling, would overflow.
pub fn dst_buffer_size_has_overflow(parsed: &ParsedOptions) -> bool {
    check_buffer_sizes(parsed).is_err()
}

/// `dst_buffer_size_has_overflow` as a `Result` carrying the offending size.
pub fn check_buffer_sizes(parsed: &ParsedOptions) -> Result<()> {
    let bpp = parsed.color_params.bytes_per_pixel();
    let crop_width = parsed.crop_rect.width.max(0) as u32;
    let crop_height = parsed.crop_rect.height.max(0) as u32;
    if byte_count(crop_width, crop_height, bpp).is_none() {
        return Err(BitmapError::buffer_size_overflow(crop_width, crop_height, bpp));
    }
    if parsed.should_scale_input
        && byte_count(parsed.resize_width, parsed.resize_height, bpp).is_none()
    {
        return Err(BitmapError::buffer_size_overflow(
            parsed.resize_width,
            parsed.resize_height,
            bpp,
        ));
    }
    Ok(())
}
