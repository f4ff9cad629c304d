// tests/async_tests.rs
//
// Background construction: completions run on the requesting context,
// immediate settlement for early failures, and teardown of that context.

use image_bitmap::engine::{promise_result, PaintRecord};
use image_bitmap::{
    create_image_bitmap_async, BitmapError, BitmapSource, ExecutionContext, ImageBitmapOptions,
    IntRect, PromiseState,
};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn raw_source(width: u32, height: u32) -> BitmapSource {
    BitmapSource::RawPixels {
        data: [10u8, 20, 30, 255].repeat((width * height) as usize),
        width,
        height,
        origin_clean: true,
    }
}

#[test]
fn completion_waits_for_the_origin_context() {
    let ctx = ExecutionContext::new();
    let promise = create_image_bitmap_async(
        raw_source(32, 32),
        None,
        &ImageBitmapOptions::new().resize_width(16),
        &ctx,
    );
    // Nobody pumps the context yet, so the result cannot be delivered.
    assert_eq!(
        promise.wait_settled(Duration::from_millis(200)),
        PromiseState::Pending
    );
    assert_eq!(ctx.run_until_settled(&promise, WAIT), PromiseState::Fulfilled);
    let bitmap = promise_result(&promise).unwrap();
    assert_eq!(bitmap.size(), (16, 16));
}

#[test]
fn several_requests_all_settle() {
    let ctx = ExecutionContext::new();
    let promises: Vec<_> = (1..=4u32)
        .map(|n| {
            create_image_bitmap_async(
                raw_source(8 * n, 8),
                None,
                &ImageBitmapOptions::default(),
                &ctx,
            )
        })
        .collect();
    for (n, promise) in (1..=4u32).zip(&promises) {
        assert_eq!(ctx.run_until_settled(promise, WAIT), PromiseState::Fulfilled);
        assert_eq!(promise_result(promise).unwrap().size(), (8 * n, 8));
    }
}

#[test]
fn option_errors_reject_without_pumping() {
    let ctx = ExecutionContext::new();
    let promise = create_image_bitmap_async(
        raw_source(4, 4),
        None,
        &ImageBitmapOptions::new().resize_quality("best"),
        &ctx,
    );
    assert_eq!(promise.state(), PromiseState::Rejected);
    assert!(promise_result(&promise).is_err());
}

#[test]
fn overflow_rejects_without_pumping() {
    let ctx = ExecutionContext::new();
    let options = ImageBitmapOptions::new()
        .resize_width(65536)
        .resize_height(65536);
    let promise = create_image_bitmap_async(raw_source(4, 4), None, &options, &ctx);
    assert_eq!(promise.state(), PromiseState::Rejected);
}

#[test]
fn disjoint_crop_resolves_immediately() {
    let ctx = ExecutionContext::new();
    let promise = create_image_bitmap_async(
        raw_source(4, 4),
        Some(IntRect::new(100, 100, 3, 5)),
        &ImageBitmapOptions::default(),
        &ctx,
    );
    assert_eq!(promise.state(), PromiseState::Fulfilled);
    let bitmap = promise_result(&promise).unwrap();
    assert_eq!(bitmap.size(), (3, 5));
    assert!(bitmap.copy_bitmap_data_raw().unwrap().iter().all(|&b| b == 0));
}

#[test]
fn vector_source_is_rasterized_at_output_size() {
    let ctx = ExecutionContext::new();
    let record = PaintRecord::new(8, 8).fill_rect(IntRect::new(0, 0, 8, 8), [255, 0, 0, 255]);
    let options = ImageBitmapOptions::new()
        .resize_width(2)
        .resize_height(2)
        .premultiply_alpha("none");
    let promise = create_image_bitmap_async(BitmapSource::vector(record, false), None, &options, &ctx);
    assert_eq!(ctx.run_until_settled(&promise, WAIT), PromiseState::Fulfilled);
    let bitmap = promise_result(&promise).unwrap();
    assert_eq!(bitmap.size(), (2, 2));
    assert!(!bitmap.origin_clean());
    assert!(!bitmap.is_premultiplied());
    assert!(bitmap
        .copy_bitmap_data_raw()
        .unwrap()
        .chunks_exact(4)
        .all(|px| px == [255, 0, 0, 255]));
}

#[test]
fn vector_source_with_color_conversion_is_converted_on_completion() {
    let ctx = ExecutionContext::new();
    let record = PaintRecord::new(4, 4).fill_rect(IntRect::new(0, 0, 4, 4), [0, 255, 0, 255]);
    let options = ImageBitmapOptions::new().color_space_conversion("rec2020");
    let promise = create_image_bitmap_async(BitmapSource::vector(record, true), None, &options, &ctx);
    assert_eq!(ctx.run_until_settled(&promise, WAIT), PromiseState::Fulfilled);
    let bitmap = promise_result(&promise).unwrap();
    assert_eq!(
        bitmap.color_params().pixel_format,
        image_bitmap::engine::PixelFormat::RgbaF16
    );
}

#[test]
fn destroyed_context_never_fulfills() {
    let ctx = ExecutionContext::new();
    let promise = create_image_bitmap_async(
        raw_source(64, 64),
        None,
        &ImageBitmapOptions::new().resize_width(128),
        &ctx,
    );
    ctx.destroy();
    assert!(!ctx.is_alive());
    // The queued or late completion is dropped along with its resolver.
    assert_eq!(promise.wait_settled(WAIT), PromiseState::Abandoned);
    assert!(matches!(
        promise_result(&promise),
        Err(BitmapError::ContextDestroyed)
    ));
}

#[test]
fn dropping_the_context_abandons_pending_work() {
    let promise = {
        let ctx = ExecutionContext::new();
        create_image_bitmap_async(raw_source(16, 16), None, &ImageBitmapOptions::default(), &ctx)
    };
    assert_eq!(promise.wait_settled(WAIT), PromiseState::Abandoned);
}

#[test]
fn failing_background_work_rejects() {
    let ctx = ExecutionContext::new();
    // Declared size passes the up-front checks; the short buffer fails on resolve.
    let source = BitmapSource::RawPixels {
        data: vec![0; 8],
        width: 4,
        height: 4,
        origin_clean: true,
    };
    let promise = create_image_bitmap_async(source, None, &ImageBitmapOptions::default(), &ctx);
    assert_eq!(ctx.run_until_settled(&promise, WAIT), PromiseState::Rejected);
}
