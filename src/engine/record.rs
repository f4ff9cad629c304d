// src/engine/record.rs
//
// PaintRecord: a self-contained list of recorded draw operations (vector or
// deferred element content). It owns everything it references, so it can be
// moved to a background thread and rasterized there.

use crate::engine::color::{ColorSpace, PixelFormat};
use crate::engine::common::run_with_panic_policy;
use crate::engine::image::{load_pixel, store_pixel, AlphaType, StaticImage, Surface};
use crate::error::{BitmapError, Result};
use crate::ops::IntRect;
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub enum PaintOp {
    /// Fill with a straight-alpha RGBA color, composited source-over.
    FillRect { rect: IntRect, color: [u8; 4] },
    /// Draw the `src` region of `image` scaled into `dst`, source-over.
    DrawImage {
        image: Arc<StaticImage>,
        src: IntRect,
        dst: IntRect,
    },
}

#[derive(Clone, Debug)]
pub struct PaintRecord {
    width: u32,
    height: u32,
    ops: Vec<PaintOp>,
}

impl PaintRecord {
    /// Empty record with a natural size of `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn fill_rect(mut self, rect: IntRect, color: [u8; 4]) -> Self {
        self.ops.push(PaintOp::FillRect {
            rect: rect.normalized(),
            color,
        });
        self
    }

    pub fn draw_image(mut self, image: Arc<StaticImage>, src: IntRect, dst: IntRect) -> Self {
        self.ops.push(PaintOp::DrawImage {
            image,
            src: src.normalized(),
            dst: dst.normalized(),
        });
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn ops(&self) -> &[PaintOp] {
        &self.ops
    }

    /// Rasterize at natural size.
    pub fn rasterize_natural(&self) -> Result<StaticImage> {
        self.rasterize(
            self.width,
            self.height,
            IntRect::from_size(self.width, self.height),
            false,
        )
    }

    /// Rasterize the `src_rect` region of the record into a `width` x
    /// `height` premultiplied sRGB image, optionally upside down.
    ///
    /// Points outside the record's natural bounds are transparent.
    pub fn rasterize(
        &self,
        width: u32,
        height: u32,
        src_rect: IntRect,
        flip_y: bool,
    ) -> Result<StaticImage> {
        if src_rect.is_empty() {
            return Err(BitmapError::invalid_argument(
                "src_rect",
                format!("{src_rect:?}"),
                "raster region must be non-empty",
            ));
        }
        run_with_panic_policy("raster:record", || {
            let mut surface =
                Surface::new_raster(width, height, PixelFormat::Rgba8, Some(ColorSpace::Srgb))?;
            let row_bytes = surface.info().min_row_bytes();
            let scale_x = src_rect.width as f32 / width as f32;
            let scale_y = src_rect.height as f32 / height as f32;
            surface
                .pixels_mut()
                .par_chunks_mut(row_bytes)
                .enumerate()
                .for_each(|(out_y, row)| {
                    let row_y = if flip_y {
                        height as usize - 1 - out_y
                    } else {
                        out_y
                    };
                    let py = src_rect.y as f32 + (row_y as f32 + 0.5) * scale_y;
                    for (out_x, px) in row.chunks_exact_mut(4).enumerate() {
                        let px_x = src_rect.x as f32 + (out_x as f32 + 0.5) * scale_x;
                        let value = self.sample(px_x, py);
                        store_pixel(PixelFormat::Rgba8, value, px);
                    }
                });
            surface.snapshot()
        })
    }

    // Premultiplied color of the record at a point.
    fn sample(&self, x: f32, y: f32) -> [f32; 4] {
        let mut acc = [0.0f32; 4];
        if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
            return acc;
        }
        for op in &self.ops {
            let src = match op {
                PaintOp::FillRect { rect, color } => {
                    if !contains(rect, x, y) {
                        continue;
                    }
                    let a = color[3] as f32 / 255.0;
                    [
                        color[0] as f32 / 255.0 * a,
                        color[1] as f32 / 255.0 * a,
                        color[2] as f32 / 255.0 * a,
                        a,
                    ]
                }
                PaintOp::DrawImage { image, src, dst } => {
                    if !contains(dst, x, y) {
                        continue;
                    }
                    match sample_image(image, src, dst, x, y) {
                        Some(px) => px,
                        None => continue,
                    }
                }
            };
            let keep = 1.0 - src[3];
            for (a, s) in acc.iter_mut().zip(src) {
                *a = s + *a * keep;
            }
        }
        acc
    }
}

fn contains(rect: &IntRect, x: f32, y: f32) -> bool {
    x >= rect.x as f32
        && y >= rect.y as f32
        && (x as f64) < rect.max_x() as f64
        && (y as f64) < rect.max_y() as f64
}

fn sample_image(image: &StaticImage, src: &IntRect, dst: &IntRect, x: f32, y: f32) -> Option<[f32; 4]> {
    let sx = src.x as f32 + (x - dst.x as f32) * src.width as f32 / dst.width as f32;
    let sy = src.y as f32 + (y - dst.y as f32) * src.height as f32 / dst.height as f32;
    if sx < 0.0 || sy < 0.0 {
        return None;
    }
    let (ix, iy) = (sx as u32, sy as u32);
    if ix >= image.width() || iy >= image.height() {
        return None;
    }
    let bpp = image.info().bytes_per_pixel();
    let start = ix as usize * bpp;
    let mut px = load_pixel(image.pixel_format(), &image.row(iy)[start..start + bpp]);
    if image.alpha_type() == AlphaType::Unpremultiplied {
        px = [px[0] * px[3], px[1] * px[3], px[2] * px[3], px[3]];
    }
    Some(px)
}
