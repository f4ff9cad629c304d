// src/engine/pool.rs
//
// Background raster pool.
//
// One global rayon pool shared by every async bitmap request, created on
// first use with `BitmapConfig::raster_threads` threads. Changes to the
// configuration after initialization have no effect.

use crate::engine::config::config;
use rayon::ThreadPool;
use std::sync::OnceLock;
use tracing::warn;

/// Minimum number of raster threads when the configured pool cannot be built.
const MIN_RASTER_THREADS: usize = 1;

static RASTER_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

fn build_pool(threads: usize) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("image-bitmap-raster#{i}"))
        .build()
}

/// The dedicated raster pool, or None if no pool could be built.
pub fn raster_pool() -> Option<&'static ThreadPool> {
    RASTER_POOL
        .get_or_init(|| {
            let threads = config().raster_threads;
            build_pool(threads)
                .or_else(|err| {
                    warn!(
                        target: "image_bitmap::tasks",
                        threads,
                        %err,
                        "raster pool build failed, retrying with minimum size"
                    );
                    build_pool(MIN_RASTER_THREADS)
                })
                .ok()
        })
        .as_ref()
}

/// Run `work` on a background raster thread.
///
/// Falls back to rayon's global pool when the dedicated one is unavailable.
pub fn spawn_raster(work: impl FnOnce() + Send + 'static) {
    match raster_pool() {
        Some(pool) => pool.spawn(work),
        None => rayon::spawn(work),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[test]
    fn raster_work_runs_on_named_thread() {
        let (tx, rx) = bounded(1);
        spawn_raster(move || {
            let name = std::thread::current().name().map(str::to_string);
            let _ = tx.send(name);
        });
        let name = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        if raster_pool().is_some() {
            assert!(name.unwrap().starts_with("image-bitmap-raster#"));
        }
    }

    #[test]
    fn pool_is_shared() {
        let a = raster_pool().map(|p| p as *const ThreadPool);
        let b = raster_pool().map(|p| p as *const ThreadPool);
        assert_eq!(a, b);
    }
}
