// src/ops.rs
//
// Option vocabulary for bitmap construction.
// These are cheap to create and store - the expensive work happens in the engine.

use crate::error::{BitmapError, Result};
use std::borrow::Cow;

/// Integer rectangle in source pixel space.
///
/// Width and height may be negative as given by a caller; `normalized()`
/// turns such a rectangle into the equivalent one with non-negative extents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IntRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin covering `width` x `height`.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, clamp_i32(width as i64), clamp_i32(height as i64))
    }

    pub fn max_x(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn max_y(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of pixels covered, zero for empty rectangles.
    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.width as u64 * self.height as u64
        }
    }

    /// Reinterpret a "backwards" rectangle: min corner plus absolute extents.
    pub fn normalized(&self) -> Self {
        let x = (self.x as i64).min(self.max_x());
        let y = (self.y as i64).min(self.max_y());
        Self::new(
            clamp_i32(x),
            clamp_i32(y),
            clamp_i32(self.width.unsigned_abs() as i64),
            clamp_i32(self.height.unsigned_abs() as i64),
        )
    }

    /// Intersection of two rectangles; an empty rectangle at the origin if disjoint.
    pub fn intersection(&self, other: &IntRect) -> IntRect {
        let left = (self.x as i64).max(other.x as i64);
        let top = (self.y as i64).max(other.y as i64);
        let right = self.max_x().min(other.max_x());
        let bottom = self.max_y().min(other.max_y());
        if left >= right || top >= bottom {
            return IntRect::default();
        }
        IntRect::new(
            clamp_i32(left),
            clamp_i32(top),
            clamp_i32(right - left),
            clamp_i32(bottom - top),
        )
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// `imageOrientation` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageOrientation {
    None,
    FlipY,
}

impl ImageOrientation {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(Self::None),
            "flip-y" => Ok(Self::FlipY),
            other => Err(BitmapError::invalid_option(
                "imageOrientation",
                other.to_string(),
            )),
        }
    }
}

/// `premultiplyAlpha` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PremultiplyAlpha {
    Default,
    Premultiply,
    None,
}

impl PremultiplyAlpha {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "default" => Ok(Self::Default),
            "premultiply" => Ok(Self::Premultiply),
            "none" => Ok(Self::None),
            other => Err(BitmapError::invalid_option(
                "premultiplyAlpha",
                other.to_string(),
            )),
        }
    }

    /// "default" behaves like "premultiply".
    pub fn wants_premultiplied(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// `colorSpaceConversion` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpaceConversion {
    None,
    Default,
    Srgb,
    LinearRgb,
    P3,
    Rec2020,
}

impl ColorSpaceConversion {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(Self::None),
            "default" => Ok(Self::Default),
            "srgb" => Ok(Self::Srgb),
            "linear-rgb" => Ok(Self::LinearRgb),
            "p3" => Ok(Self::P3),
            "rec2020" => Ok(Self::Rec2020),
            other => Err(BitmapError::invalid_option(
                "colorSpaceConversion",
                other.to_string(),
            )),
        }
    }
}

/// `resizeQuality` option, mapped onto a resampling filter by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResizeQuality {
    High,
    Medium,
    Pixelated,
    #[default]
    Low,
}

impl ResizeQuality {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "pixelated" => Ok(Self::Pixelated),
            "low" => Ok(Self::Low),
            other => Err(BitmapError::invalid_option(
                "resizeQuality",
                other.to_string(),
            )),
        }
    }
}

/// Requested alpha representation for conversions and pixel copies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaDisposition {
    Premultiply,
    Unpremultiply,
    DontChange,
}

/// Channel order of 8-bit pixel copies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum U8ColorType {
    #[default]
    Rgba,
    Bgra,
}

/// Caller-supplied options, string valued as they arrive from a binding layer.
///
/// Validation happens when the engine parses them; an unknown string is a
/// configuration error, never silently ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBitmapOptions {
    pub image_orientation: Cow<'static, str>,
    pub premultiply_alpha: Cow<'static, str>,
    pub color_space_conversion: Cow<'static, str>,
    pub resize_width: Option<u32>,
    pub resize_height: Option<u32>,
    pub resize_quality: Cow<'static, str>,
}

impl Default for ImageBitmapOptions {
    fn default() -> Self {
        Self {
            image_orientation: Cow::Borrowed("none"),
            premultiply_alpha: Cow::Borrowed("default"),
            color_space_conversion: Cow::Borrowed("default"),
            resize_width: None,
            resize_height: None,
            resize_quality: Cow::Borrowed("low"),
        }
    }
}

impl ImageBitmapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image_orientation(mut self, value: impl Into<Cow<'static, str>>) -> Self {
        self.image_orientation = value.into();
        self
    }

    pub fn premultiply_alpha(mut self, value: impl Into<Cow<'static, str>>) -> Self {
        self.premultiply_alpha = value.into();
        self
    }

    pub fn color_space_conversion(mut self, value: impl Into<Cow<'static, str>>) -> Self {
        self.color_space_conversion = value.into();
        self
    }

    pub fn resize_width(mut self, width: u32) -> Self {
        self.resize_width = Some(width);
        self
    }

    pub fn resize_height(mut self, height: u32) -> Self {
        self.resize_height = Some(height);
        self
    }

    pub fn resize_quality(mut self, value: impl Into<Cow<'static, str>>) -> Self {
        self.resize_quality = value.into();
        self
    }
}
