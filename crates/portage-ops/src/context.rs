//! Shared per-operation flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The two booleans shared between the UI thread and the worker.
///
/// `in_progress` blocks new operations from starting while one is active;
/// `cancelled` is set by the UI and polled by the worker at safe points.
/// Neither is a lock: only one worker runs at a time by construction.
#[derive(Debug, Default)]
pub struct OpContext {
    in_progress: AtomicBool,
    cancelled: AtomicBool,
}

impl OpContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark an operation as started, clearing any stale cancel request.
    pub fn begin(&self) {
        self.in_progress.store(true, Ordering::Relaxed);
        self.cancelled.store(false, Ordering::Relaxed);
    }

    /// Mark the operation as finished.
    pub fn end(&self) {
        self.in_progress.store(false, Ordering::Relaxed);
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Relaxed)
    }

    /// Request cooperative cancellation. Harmless after the operation has
    /// already finished.
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
