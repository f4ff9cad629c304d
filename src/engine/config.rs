// src/engine/config.rs
//
// Runtime configuration, read once from the environment.
//
// Invalid values fall back to defaults. Changes after first use have no effect.

use once_cell::sync::Lazy;

/// Below this pixel count the alpha converter reads pixels back instead of
/// drawing onto a new surface.
pub const DEFAULT_READBACK_THRESHOLD_PIXELS: u64 = 16384;

const READBACK_THRESHOLD_ENV: &str = "IMAGE_BITMAP_READBACK_THRESHOLD";
const RASTER_THREADS_ENV: &str = "IMAGE_BITMAP_RASTER_THREADS";

/// Upper bound on the background raster pool size.
pub const MAX_RASTER_THREADS: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitmapConfig {
    pub readback_threshold_pixels: u64,
    pub raster_threads: usize,
}

impl Default for BitmapConfig {
    fn default() -> Self {
        Self {
            readback_threshold_pixels: DEFAULT_READBACK_THRESHOLD_PIXELS,
            raster_threads: default_raster_threads(),
        }
    }
}

impl BitmapConfig {
    /// Build a config from a variable lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let readback_threshold_pixels = lookup(READBACK_THRESHOLD_ENV)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(defaults.readback_threshold_pixels);
        let raster_threads = lookup(RASTER_THREADS_ENV)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|n| (1..=MAX_RASTER_THREADS).contains(n))
            .unwrap_or(defaults.raster_threads);
        Self {
            readback_threshold_pixels,
            raster_threads,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn default_raster_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_RASTER_THREADS)
}

static CONFIG: Lazy<BitmapConfig> = Lazy::new(BitmapConfig::from_env);

/// Process-wide configuration.
pub fn config() -> &'static BitmapConfig {
    &CONFIG
}
