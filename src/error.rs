// src/error.rs
//
// Unified error handling for image-bitmap
//
// Error Taxonomy:
// - UserError: Invalid options or arguments, recoverable
// - CodecError: Decode/resample issues
// - ResourceLimit: Overflow/allocation/dimension limits
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy for callers that map failures onto their own exception types
///
/// - UserError: Invalid input, recoverable by the caller
/// - CodecError: Decode/resample issues
/// - ResourceLimit: Memory/overflow/dimension limits
/// - InternalBug: Library bugs (should not happen)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Decode/resample issues
    CodecError,
    /// Memory/overflow/dimension limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    /// Get string representation of error category
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Get the IMAGE_BITMAP_* error code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "IMAGE_BITMAP_USER_ERROR",
            ErrorCategory::CodecError => "IMAGE_BITMAP_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "IMAGE_BITMAP_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "IMAGE_BITMAP_INTERNAL_BUG",
        }
    }
}

/// image-bitmap error types
///
/// Every pipeline stage reports failure through one of these variants;
/// a stage never hands a partially built image to the next one.
#[derive(Debug, Clone, Error)]
pub enum BitmapError {
    // Configuration Errors
    #[error("Invalid ImageBitmap option {name}: '{value}'")]
    InvalidOption {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
    },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Size Limit Errors
    #[error("Buffer size for {width}x{height} at {bytes_per_pixel} bytes per pixel overflows")]
    BufferSizeOverflow {
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    },

    #[error("Failed to allocate {bytes} bytes for a {width}x{height} buffer")]
    AllocationFailed { width: u32, height: u32, bytes: u64 },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    // Stage Errors
    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Color conversion {from} -> {to} failed: {message}")]
    ColorConversionFailed {
        from: Cow<'static, str>,
        to: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Pixel data has {actual} bytes, expected {expected}")]
    InvalidPixelData { expected: u64, actual: u64 },

    #[error("Alpha disposition must be premultiply or unpremultiply")]
    InvalidAlphaDisposition,

    // State Errors
    #[error("Image source is not usable: {reason}")]
    SourceUnavailable { reason: Cow<'static, str> },

    #[error("ImageBitmap has been closed or transferred")]
    Neutered,

    #[error("Execution context was destroyed before the result was delivered")]
    ContextDestroyed,

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl BitmapError {
    pub fn invalid_option(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidOption {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn buffer_size_overflow(width: u32, height: u32, bytes_per_pixel: u32) -> Self {
        Self::BufferSizeOverflow {
            width,
            height,
            bytes_per_pixel,
        }
    }

    pub fn allocation_failed(width: u32, height: u32, bytes: u64) -> Self {
        Self::AllocationFailed {
            width,
            height,
            bytes,
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn color_conversion_failed(
        from: impl Into<Cow<'static, str>>,
        to: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ColorConversionFailed {
            from: from.into(),
            to: to.into(),
            message: message.into(),
        }
    }

    pub fn invalid_pixel_data(expected: u64, actual: u64) -> Self {
        Self::InvalidPixelData { expected, actual }
    }

    pub fn invalid_alpha_disposition() -> Self {
        Self::InvalidAlphaDisposition
    }

    pub fn source_unavailable(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::SourceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn neutered() -> Self {
        Self::Neutered
    }

    pub fn context_destroyed() -> Self {
        Self::ContextDestroyed
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (caller can fix it)
    ///
    /// Consistent with category():
    /// - UserError and ResourceLimit errors are recoverable
    /// - CodecError and InternalBug errors are not
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            // UserError: Invalid input, recoverable
            Self::InvalidOption { .. }
            | Self::InvalidArgument { .. }
            | Self::InvalidPixelData { .. }
            | Self::SourceUnavailable { .. }
            | Self::Neutered => ErrorCategory::UserError,

            // CodecError: Decode/resample issues
            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::ResizeFailed { .. }
            | Self::ColorConversionFailed { .. } => ErrorCategory::CodecError,

            // ResourceLimit: the requested buffers do not fit
            Self::BufferSizeOverflow { .. }
            | Self::AllocationFailed { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::ContextDestroyed => ErrorCategory::ResourceLimit,

            // InternalBug: contract violations inside the library
            Self::InvalidAlphaDisposition | Self::InternalPanic { .. } => {
                ErrorCategory::InternalBug
            }
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, BitmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BitmapError::invalid_option("imageOrientation", "sideways");
        assert!(err.to_string().contains("sideways"));
        assert!(err.to_string().contains("imageOrientation"));
    }

    #[test]
    fn test_error_recoverable() {
        assert!(BitmapError::invalid_option("premultiplyAlpha", "maybe").is_recoverable());
        assert!(BitmapError::buffer_size_overflow(65536, 65536, 4).is_recoverable());
        assert!(!BitmapError::decode_failed("test").is_recoverable());
        assert!(!BitmapError::internal_panic("test").is_recoverable());
        assert!(!BitmapError::invalid_alpha_disposition().is_recoverable());
    }

    #[test]
    fn test_error_category_mapping() {
        assert_eq!(
            BitmapError::invalid_argument("resizeWidth", "0", "must be non-zero").category(),
            ErrorCategory::UserError
        );
        assert_eq!(BitmapError::neutered().category(), ErrorCategory::UserError);
        assert_eq!(
            BitmapError::resize_failed((10, 10), (5, 5), "x").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            BitmapError::color_conversion_failed("Srgb", "Rec2020", "x").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            BitmapError::allocation_failed(1, 1, 4).category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            BitmapError::pixel_count_exceeds_limit(10, 5).category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            BitmapError::internal_panic("boom").category(),
            ErrorCategory::InternalBug
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCategory::UserError.code(), "IMAGE_BITMAP_USER_ERROR");
        assert_eq!(ErrorCategory::ResourceLimit.as_str(), "ResourceLimit");
    }

    #[test]
    fn test_clone_preserves_fields() {
        let err = BitmapError::resize_failed((100, 100), (50, 50), "boom");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
