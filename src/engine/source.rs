// src/engine/source.rs
//
// Bitmap sources: one closed variant per kind of input the pipeline accepts.
// Each resolves to a StaticImage plus the flags the pipeline needs.

use crate::engine::bitmap::ImageBitmap;
use crate::engine::color::{ColorSpace, PixelFormat};
use crate::engine::decoder;
use crate::engine::image::{AlphaType, ImageInfo, StaticImage, Surface};
use crate::engine::record::PaintRecord;
use crate::error::{BitmapError, Result};
use std::sync::Arc;

/// Readiness of a canvas snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceImageStatus {
    #[default]
    Normal,
    Undecodable,
    ZeroSize,
    Incomplete,
    Invalid,
}

/// What an image element currently holds.
#[derive(Debug)]
pub enum ElementContent {
    /// Already decoded pixels (may still carry their encoded bytes).
    Raster(StaticImage),
    /// Encoded bytes not decoded yet.
    Encoded(Arc<[u8]>),
    /// Vector or deferred content.
    Vector(PaintRecord),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    ImageElement,
    Video,
    Canvas,
    OffscreenCanvas,
    RawPixels,
    ImageData,
    ExistingBitmap,
    InternalImage,
}

#[derive(Debug)]
pub enum BitmapSource {
    ImageElement {
        content: ElementContent,
        origin_clean: bool,
    },
    Video {
        frame: StaticImage,
        origin_clean: bool,
    },
    Canvas {
        snapshot: Option<StaticImage>,
        status: SourceImageStatus,
        origin_clean: bool,
    },
    OffscreenCanvas {
        snapshot: Option<StaticImage>,
        status: SourceImageStatus,
        origin_clean: bool,
    },
    /// Straight-alpha sRGB RGBA8 bytes.
    RawPixels {
        data: Vec<u8>,
        width: u32,
        height: u32,
        origin_clean: bool,
    },
    /// Straight-alpha sRGB RGBA8 bytes. Always origin clean.
    ImageData {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
    ExistingBitmap {
        image: StaticImage,
        origin_clean: bool,
    },
    InternalImage {
        image: StaticImage,
        origin_clean: bool,
    },
}

/// A source reduced to the pipeline's common representation.
#[derive(Debug)]
pub struct ResolvedSource {
    pub image: StaticImage,
    pub origin_clean: bool,
    pub source_is_unpremul: bool,
    pub kind: SourceKind,
}

fn canvas_snapshot(snapshot: Option<StaticImage>, status: SourceImageStatus) -> Result<StaticImage> {
    if status != SourceImageStatus::Normal {
        return Err(BitmapError::source_unavailable(format!(
            "canvas snapshot status is {status:?}"
        )));
    }
    snapshot.ok_or_else(|| BitmapError::source_unavailable("canvas has no snapshot"))
}

fn straight_pixels(data: Vec<u8>, width: u32, height: u32) -> Result<StaticImage> {
    let info = ImageInfo::new(
        width,
        height,
        PixelFormat::Rgba8,
        AlphaType::Unpremultiplied,
        Some(ColorSpace::Srgb),
    );
    StaticImage::from_raster(info, data)
}

impl BitmapSource {
    pub fn image(image: StaticImage, origin_clean: bool) -> Self {
        Self::ImageElement {
            content: ElementContent::Raster(image),
            origin_clean,
        }
    }

    pub fn encoded(bytes: impl Into<Arc<[u8]>>, origin_clean: bool) -> Self {
        Self::ImageElement {
            content: ElementContent::Encoded(bytes.into()),
            origin_clean,
        }
    }

    pub fn vector(record: PaintRecord, origin_clean: bool) -> Self {
        Self::ImageElement {
            content: ElementContent::Vector(record),
            origin_clean,
        }
    }

    pub fn image_data(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::ImageData {
            data,
            width,
            height,
        }
    }

    /// Source from another bitmap. Copies its pixels; the bitmap stays usable.
    pub fn from_bitmap(bitmap: &ImageBitmap) -> Result<Self> {
        let image = bitmap.image().ok_or_else(BitmapError::neutered)?;
        Ok(Self::ExistingBitmap {
            image: image.try_clone()?,
            origin_clean: bitmap.origin_clean(),
        })
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::ImageElement { .. } => SourceKind::ImageElement,
            Self::Video { .. } => SourceKind::Video,
            Self::Canvas { .. } => SourceKind::Canvas,
            Self::OffscreenCanvas { .. } => SourceKind::OffscreenCanvas,
            Self::RawPixels { .. } => SourceKind::RawPixels,
            Self::ImageData { .. } => SourceKind::ImageData,
            Self::ExistingBitmap { .. } => SourceKind::ExistingBitmap,
            Self::InternalImage { .. } => SourceKind::InternalImage,
        }
    }

    pub fn origin_clean(&self) -> bool {
        match self {
            Self::ImageElement { origin_clean, .. }
            | Self::Video { origin_clean, .. }
            | Self::Canvas { origin_clean, .. }
            | Self::OffscreenCanvas { origin_clean, .. }
            | Self::RawPixels { origin_clean, .. }
            | Self::ExistingBitmap { origin_clean, .. }
            | Self::InternalImage { origin_clean, .. } => *origin_clean,
            Self::ImageData { .. } => true,
        }
    }

    /// Natural size, known without decoding or drawing anything.
    pub fn natural_size(&self) -> Result<(u32, u32)> {
        match self {
            Self::ImageElement { content, .. } => match content {
                ElementContent::Raster(image) => Ok(image.size()),
                ElementContent::Encoded(bytes) => decoder::peek_dimensions(bytes),
                ElementContent::Vector(record) => Ok(record.size()),
            },
            Self::Video { frame, .. } => Ok(frame.size()),
            Self::Canvas {
                snapshot, status, ..
            }
            | Self::OffscreenCanvas {
                snapshot, status, ..
            } => {
                if *status != SourceImageStatus::Normal {
                    return Err(BitmapError::source_unavailable(format!(
                        "canvas snapshot status is {status:?}"
                    )));
                }
                snapshot
                    .as_ref()
                    .map(StaticImage::size)
                    .ok_or_else(|| BitmapError::source_unavailable("canvas has no snapshot"))
            }
            Self::RawPixels { width, height, .. } | Self::ImageData { width, height, .. } => {
                Ok((*width, *height))
            }
            Self::ExistingBitmap { image, .. } | Self::InternalImage { image, .. } => {
                Ok(image.size())
            }
        }
    }

    /// True when the source pixels are straight alpha.
    pub fn is_unpremultiplied(&self) -> bool {
        match self {
            Self::RawPixels { .. } | Self::ImageData { .. } => true,
            Self::ExistingBitmap { image, .. } | Self::InternalImage { image, .. } => {
                image.alpha_type() == AlphaType::Unpremultiplied
            }
            _ => false,
        }
    }

    /// Vector content, if this is an image element holding a PaintRecord.
    pub fn paint_record(&self) -> Option<&PaintRecord> {
        match self {
            Self::ImageElement {
                content: ElementContent::Vector(record),
                ..
            } => Some(record),
            _ => None,
        }
    }

    /// Resolve to the common image representation.
    ///
    /// Vector content is rasterized at its natural size, encoded content is
    /// decoded, and video frames are painted onto a software surface.
    pub fn resolve(self) -> Result<ResolvedSource> {
        let kind = self.kind();
        let origin_clean = self.origin_clean();
        let (image, source_is_unpremul) = match self {
            Self::ImageElement { content, .. } => {
                let image = match content {
                    ElementContent::Raster(image) => image,
                    ElementContent::Encoded(bytes) => decoder::decode_element(bytes)?,
                    ElementContent::Vector(record) => record.rasterize_natural()?,
                };
                (image, false)
            }
            Self::Video { frame, .. } => {
                let mut surface = Surface::new_raster(
                    frame.width(),
                    frame.height(),
                    frame.pixel_format(),
                    frame.color_space(),
                )?;
                surface.draw_image(&frame, false);
                (surface.snapshot()?, false)
            }
            Self::Canvas {
                snapshot, status, ..
            }
            | Self::OffscreenCanvas {
                snapshot, status, ..
            } => (canvas_snapshot(snapshot, status)?, false),
            Self::RawPixels {
                data,
                width,
                height,
                ..
            }
            | Self::ImageData {
                data,
                width,
                height,
            } => (straight_pixels(data, width, height)?, true),
            Self::ExistingBitmap { image, .. } | Self::InternalImage { image, .. } => {
                let straight = image.alpha_type() == AlphaType::Unpremultiplied;
                (image, straight)
            }
        };
        Ok(ResolvedSource {
            image,
            origin_clean,
            source_is_unpremul,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::IntRect;

    fn straight_frame() -> StaticImage {
        straight_pixels(vec![200, 100, 50, 128], 1, 1).unwrap()
    }

    #[test]
    fn image_data_is_unpremultiplied_and_clean() {
        let resolved = BitmapSource::image_data(vec![1, 2, 3, 4], 1, 1).resolve().unwrap();
        assert!(resolved.source_is_unpremul);
        assert!(resolved.origin_clean);
        assert_eq!(resolved.kind, SourceKind::ImageData);
        assert_eq!(resolved.image.alpha_type(), AlphaType::Unpremultiplied);
    }

    #[test]
    fn raw_pixels_validate_length() {
        let source = BitmapSource::RawPixels {
            data: vec![0; 7],
            width: 1,
            height: 2,
            origin_clean: false,
        };
        assert!(matches!(
            source.resolve(),
            Err(BitmapError::InvalidPixelData { expected: 8, actual: 7 })
        ));
    }

    #[test]
    fn video_frame_is_painted_premultiplied() {
        let source = BitmapSource::Video {
            frame: straight_frame(),
            origin_clean: false,
        };
        let resolved = source.resolve().unwrap();
        assert!(!resolved.origin_clean);
        assert!(!resolved.source_is_unpremul);
        assert_eq!(resolved.image.alpha_type(), AlphaType::Premultiplied);
        assert_eq!(resolved.image.row(0), &[100, 50, 25, 128]);
    }

    #[test]
    fn canvas_status_must_be_normal() {
        let source = BitmapSource::Canvas {
            snapshot: Some(straight_frame()),
            status: SourceImageStatus::Incomplete,
            origin_clean: true,
        };
        assert!(matches!(
            source.resolve(),
            Err(BitmapError::SourceUnavailable { .. })
        ));
        let missing = BitmapSource::OffscreenCanvas {
            snapshot: None,
            status: SourceImageStatus::Normal,
            origin_clean: true,
        };
        assert!(missing.resolve().is_err());
    }

    #[test]
    fn natural_size_does_not_resolve() {
        let source = BitmapSource::RawPixels {
            data: vec![0; 3],
            width: 5,
            height: 7,
            origin_clean: true,
        };
        // Size comes from the declared dimensions; the bad length shows up on resolve.
        assert_eq!(source.natural_size().unwrap(), (5, 7));
        assert!(source.is_unpremultiplied());
        let canvas = BitmapSource::Canvas {
            snapshot: None,
            status: SourceImageStatus::ZeroSize,
            origin_clean: true,
        };
        assert!(canvas.natural_size().is_err());
    }

    #[test]
    fn vector_content_rasterizes_at_natural_size() {
        let record = PaintRecord::new(3, 2).fill_rect(IntRect::new(0, 0, 3, 2), [9, 9, 9, 255]);
        let source = BitmapSource::vector(record, true);
        assert!(source.paint_record().is_some());
        let resolved = source.resolve().unwrap();
        assert_eq!(resolved.image.size(), (3, 2));
    }
}
