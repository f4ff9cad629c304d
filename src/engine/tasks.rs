// src/engine/tasks.rs
//
// Asynchronous bitmap construction.
//
// The request is parsed and size-checked on the calling context. The pixel
// work moves to the raster pool together with everything it needs; its
// result comes back as a completion task posted to the calling context's
// queue, and only that task settles the promise. A context that is gone by
// then never sees the result.

use crate::engine::alpha::get_image_with_alpha_disposition;
use crate::engine::api::prepare;
use crate::engine::bitmap::ImageBitmap;
use crate::engine::color::apply_color_space_conversion;
use crate::engine::common::run_with_panic_policy;
use crate::engine::crop::make_blank_image;
use crate::engine::image::StaticImage;
use crate::engine::options::ParsedOptions;
use crate::engine::pipeline::process;
use crate::engine::pool::spawn_raster;
use crate::engine::source::{BitmapSource, ElementContent};
use crate::error::{BitmapError, Result};
use crate::ops::{AlphaDisposition, ImageBitmapOptions, IntRect};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tracing::debug;

type Task = Box<dyn FnOnce() + Send + 'static>;

// =============================================================================
// EXECUTION CONTEXT
// =============================================================================

/// A single-threaded task queue standing for the context that issued a
/// request. Tasks only run when the owning thread pumps the queue.
///
/// Not `Send`: queued tasks always run on the thread that created it.
pub struct ExecutionContext {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    alive: Arc<RwLock<bool>>,
    owner: ThreadId,
    _not_send: PhantomData<Rc<()>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            alive: Arc::new(RwLock::new(true)),
            owner: std::thread::current().id(),
            _not_send: PhantomData,
        }
    }

    /// Handle for posting tasks back to this context from any thread.
    pub fn task_runner(&self) -> TaskRunner {
        TaskRunner {
            sender: self.sender.clone(),
            alive: Arc::clone(&self.alive),
        }
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }

    pub fn owner_thread(&self) -> ThreadId {
        self.owner
    }

    /// Run one queued task, waiting up to `timeout` for it.
    pub fn run_next(&self, timeout: Duration) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }

    /// Run every task already queued. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.is_alive() {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Pump the queue until `promise` settles or `timeout` passes.
    pub fn run_until_settled(&self, promise: &BitmapPromise, timeout: Duration) -> PromiseState {
        let deadline = Instant::now() + timeout;
        loop {
            let state = promise.state();
            if state != PromiseState::Pending {
                return state;
            }
            let now = Instant::now();
            if now >= deadline {
                return state;
            }
            self.run_next((deadline - now).min(Duration::from_millis(10)));
        }
    }

    /// Tear the context down. Queued tasks are dropped without running and
    /// later posts are refused.
    pub fn destroy(&self) {
        let was_alive = std::mem::replace(&mut *self.alive.write(), false);
        // Posts hold the read lock while sending, so nothing lands after this drain.
        if was_alive {
            let dropped = self.receiver.try_iter().count();
            debug!(target: "image_bitmap::tasks", dropped, "execution context destroyed");
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Cloneable, thread-safe handle that posts tasks to an ExecutionContext.
#[derive(Clone)]
pub struct TaskRunner {
    sender: Sender<Task>,
    alive: Arc<RwLock<bool>>,
}

impl TaskRunner {
    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }

    /// Queue `task`. Returns false, dropping the task, if the context is gone.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let alive = self.alive.read();
        if !*alive {
            return false;
        }
        self.sender.send(Box::new(task)).is_ok()
    }
}

// =============================================================================
// PROMISE
// =============================================================================

/// Observable outcome of an async request. Rejection carries no payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
    /// The resolver was dropped unsettled, e.g. its context died first.
    Abandoned,
}

enum Slot {
    Pending,
    Fulfilled(Option<ImageBitmap>),
    Rejected,
    Abandoned,
}

struct Shared {
    slot: Mutex<Slot>,
    cvar: Condvar,
}

impl Shared {
    fn settle(&self, next: Slot) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = next;
            self.cvar.notify_all();
        }
    }
}

fn state_of(slot: &Slot) -> PromiseState {
    match slot {
        Slot::Pending => PromiseState::Pending,
        Slot::Fulfilled(_) => PromiseState::Fulfilled,
        Slot::Rejected => PromiseState::Rejected,
        Slot::Abandoned => PromiseState::Abandoned,
    }
}

/// Caller side of an async request.
pub struct BitmapPromise {
    shared: Arc<Shared>,
}

/// Settling side. Consumed by `resolve`/`reject`, so it settles at most once.
pub struct BitmapResolver {
    shared: Option<Arc<Shared>>,
}

impl BitmapPromise {
    pub fn new() -> (BitmapPromise, BitmapResolver) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::Pending),
            cvar: Condvar::new(),
        });
        (
            BitmapPromise {
                shared: Arc::clone(&shared),
            },
            BitmapResolver {
                shared: Some(shared),
            },
        )
    }

    pub fn state(&self) -> PromiseState {
        state_of(&self.shared.slot.lock())
    }

    /// Take the bitmap of a fulfilled promise. Later calls return None.
    pub fn take_bitmap(&self) -> Option<ImageBitmap> {
        match &mut *self.shared.slot.lock() {
            Slot::Fulfilled(bitmap) => bitmap.take(),
            _ => None,
        }
    }

    /// Block until settled or `timeout` passes. Must not be called on the
    /// context that has to run the completion; use
    /// `ExecutionContext::run_until_settled` there.
    pub fn wait_settled(&self, timeout: Duration) -> PromiseState {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        while matches!(*slot, Slot::Pending) {
            if self.shared.cvar.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        state_of(&slot)
    }
}

impl BitmapResolver {
    pub fn resolve(mut self, bitmap: ImageBitmap) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Slot::Fulfilled(Some(bitmap)));
        }
    }

    pub fn reject(mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Slot::Rejected);
        }
    }
}

impl Drop for BitmapResolver {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Slot::Abandoned);
        }
    }
}

// =============================================================================
// ASYNC CONSTRUCTION
// =============================================================================

// Vector content is rasterized straight at the output size; crop, scale and
// flip are folded into the raster transform.
fn rasterize_record_work(
    source: BitmapSource,
    parsed: ParsedOptions,
) -> Result<StaticImage> {
    match source {
        BitmapSource::ImageElement {
            content: ElementContent::Vector(record),
            ..
        } => {
            let (width, height) = parsed.output_size();
            record.rasterize(width, height, parsed.crop_rect, parsed.flip_y)
        }
        other => {
            let resolved = other.resolve()?;
            process(resolved.image, resolved.kind, &parsed)
        }
    }
}

// Runs on the origin context, after a vector raster.
fn finish_record_raster(image: StaticImage, parsed: &ParsedOptions) -> Result<StaticImage> {
    let mut result = image;
    if !parsed.premultiply_alpha {
        result = get_image_with_alpha_disposition(result, AlphaDisposition::Unpremultiply)?;
    }
    if parsed.has_color_space_conversion {
        result = apply_color_space_conversion(result, &parsed.color_params)?;
    }
    Ok(result)
}

fn settle(resolver: BitmapResolver, outcome: Result<StaticImage>, origin_clean: bool) {
    match outcome {
        Ok(image) => resolver.resolve(ImageBitmap::new(image, origin_clean)),
        Err(err) => {
            debug!(
                target: "image_bitmap::tasks",
                code = err.category().code(),
                %err,
                "async image bitmap rejected"
            );
            resolver.reject();
        }
    }
}

/// Start building an ImageBitmap from `source` off the calling thread.
///
/// Option and overflow errors reject immediately. A crop that misses the
/// source resolves immediately with a transparent bitmap. Everything else is
/// settled by a completion task on `context`; the caller must pump it.
pub fn create_image_bitmap_async(
    source: BitmapSource,
    crop: Option<IntRect>,
    options: &ImageBitmapOptions,
    context: &ExecutionContext,
) -> BitmapPromise {
    let (promise, resolver) = BitmapPromise::new();
    let origin_clean = source.origin_clean();

    let parsed = match prepare(&source, crop, options) {
        Ok(parsed) => parsed,
        Err(err) => {
            settle(resolver, Err(err), origin_clean);
            return promise;
        }
    };

    let bounds = match source.natural_size() {
        Ok((width, height)) => IntRect::from_size(width, height),
        Err(err) => {
            settle(resolver, Err(err), origin_clean);
            return promise;
        }
    };
    if parsed.crop_rect.intersection(&bounds).is_empty() {
        debug!(target: "image_bitmap::tasks", crop = ?parsed.crop_rect, "crop outside source, resolving blank");
        settle(resolver, make_blank_image(&parsed), origin_clean);
        return promise;
    }

    let is_vector = source.paint_record().is_some();
    let runner = context.task_runner();
    debug!(target: "image_bitmap::tasks", kind = ?source.kind(), is_vector, "dispatching raster work");
    spawn_raster(move || {
        let outcome = run_with_panic_policy("raster:async", || rasterize_record_work(source, parsed));
        let posted = runner.post(move || {
            let outcome = if is_vector {
                outcome.and_then(|image| finish_record_raster(image, &parsed))
            } else {
                outcome
            };
            settle(resolver, outcome, origin_clean);
        });
        if !posted {
            debug!(target: "image_bitmap::tasks", "execution context gone, discarding result");
        }
    });
    promise
}

/// The bitmap of a fulfilled promise as a `Result`.
///
/// Abandoned promises map to `ContextDestroyed`; rejected or pending ones to
/// `SourceUnavailable`.
pub fn promise_result(promise: &BitmapPromise) -> Result<ImageBitmap> {
    match promise.state() {
        PromiseState::Fulfilled => promise
            .take_bitmap()
            .ok_or_else(|| BitmapError::source_unavailable("bitmap already taken")),
        PromiseState::Abandoned => Err(BitmapError::context_destroyed()),
        PromiseState::Rejected => Err(BitmapError::source_unavailable("promise rejected")),
        PromiseState::Pending => Err(BitmapError::source_unavailable("promise pending")),
    }
}
