// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::{BitmapError, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Run decode or raster work, turning a panic into `InternalPanic`.
///
/// Third-party codecs and resamplers are not trusted to never panic on
/// hostile input; a panic must not cross a pipeline stage boundary.
pub fn run_with_panic_policy<T>(label: &'static str, work: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(target: "image_bitmap::pipeline", label, %message, "panic captured");
            Err(BitmapError::internal_panic(format!("{label}: {message}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
