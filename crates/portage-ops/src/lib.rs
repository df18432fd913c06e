//! Concurrent file-operation engine for portage.
//!
//! This crate performs copy, move, and delete of files and directory trees
//! across storage backends, with fine-grained progress reporting,
//! cooperative cancellation, and cache-invalidation hooks. Operations run
//! on a background task and return a supervised [`tokio::task::JoinHandle`]
//! yielding an [`OperationOutcome`].

mod context;
mod copy;
mod count;
mod delete;
mod hooks;
mod move_op;
mod outcome;
mod progress;
mod transfer;
mod walk;
mod worker;

pub use context::OpContext;
pub use count::count_files_recursively;
pub use hooks::{CacheInvalidator, Notifier, NullInvalidator, NullNotifier};
pub use outcome::OperationOutcome;
pub use progress::{OperationKind, ProgressCallback, ProgressSnapshot, ProgressTracker};
pub use transfer::{copy_file_with_progress, CHUNK_SIZE, STREAM_THRESHOLD};

use std::sync::Arc;

/// Invoked once when an operation finishes, with (succeeded, errors).
///
/// Supplying a callback suppresses the engine's default summary log line.
pub type CompletionCallback = Box<dyn FnOnce(usize, usize) + Send + 'static>;

/// Options accepted by every operation entry point.
#[derive(Default)]
pub struct OpOptions {
    /// Overwrite existing destinations instead of skipping them.
    pub overwrite: bool,
    /// Append this call's items to the already-running operation instead
    /// of starting a new one.
    pub continue_progress: bool,
    /// Optional completion callback.
    pub completion: Option<CompletionCallback>,
}

impl OpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn continuing(mut self) -> Self {
        self.continue_progress = true;
        self
    }

    pub fn on_completion(mut self, callback: impl FnOnce(usize, usize) + Send + 'static) -> Self {
        self.completion = Some(Box::new(callback));
        self
    }
}

/// Entry point for file operations.
///
/// Holds the progress tracker and the caller-supplied hooks; the
/// `perform_*` methods (one per operation, in their own modules) spawn a
/// background worker and return its handle.
pub struct FileOperator {
    tracker: Arc<ProgressTracker>,
    cache: Arc<dyn CacheInvalidator>,
    notifier: Arc<dyn Notifier>,
    observer: Option<ProgressCallback>,
}

impl FileOperator {
    pub fn new(tracker: Arc<ProgressTracker>) -> Self {
        Self {
            tracker,
            cache: Arc::new(NullInvalidator),
            notifier: Arc::new(NullNotifier),
            observer: None,
        }
    }

    /// Install a cache-invalidation hook.
    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    /// Install a UI-notification hook.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Observer invoked on every progress mutation.
    pub fn with_observer(mut self, observer: ProgressCallback) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }
}

impl Default for FileOperator {
    fn default() -> Self {
        Self::new(Arc::new(ProgressTracker::new()))
    }
}
