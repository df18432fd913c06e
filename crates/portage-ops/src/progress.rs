//! Progress tracking for the single active operation.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// The type of operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Copy,
    Move,
    Delete,
    ArchiveCreate,
    ArchiveExtract,
}

impl OperationKind {
    /// Verb for summary lines ("copied", "moved", ...).
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Copy => "copied",
            Self::Move => "moved",
            Self::Delete => "deleted",
            Self::ArchiveCreate => "archived",
            Self::ArchiveExtract => "extracted",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Delete => write!(f, "Delete"),
            Self::ArchiveCreate => write!(f, "Archive"),
            Self::ArchiveExtract => write!(f, "Extract"),
        }
    }
}

/// Point-in-time view of the active operation, safe to hand to a renderer.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub kind: OperationKind,
    pub total_items: usize,
    pub processed_items: usize,
    /// Display name of the item currently being processed.
    pub current_item: String,
    /// Label or destination suffix shown next to the counts.
    pub label: String,
    pub errors: usize,
    /// (bytes_done, bytes_total) while a single large file streams.
    pub byte_progress: Option<(u64, u64)>,
    /// Bumped by the animation loop so spinners keep moving.
    pub animation_tick: u64,
}

impl ProgressSnapshot {
    /// Progress as a percentage of items processed.
    pub fn percentage(&self) -> f64 {
        if self.total_items > 0 {
            (self.processed_items as f64 / self.total_items as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Observer invoked on every progress mutation.
pub type ProgressCallback = std::sync::Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

struct OperationState {
    snapshot: ProgressSnapshot,
    callback: Option<ProgressCallback>,
    last_emit: Option<Instant>,
}

/// Holds the state of at most one active operation.
///
/// Mutated only by the worker thread; the UI reads [`snapshot`] on its own
/// render cycle. The observer callback is throttled so per-file updates
/// cannot flood the UI thread; total revisions, errors, and animation
/// ticks always go through.
///
/// [`snapshot`]: ProgressTracker::snapshot
pub struct ProgressTracker {
    state: Mutex<Option<OperationState>>,
    throttle: Duration,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::with_throttle(Duration::from_millis(50))
    }

    /// Tracker with a custom callback throttle; zero disables throttling.
    pub fn with_throttle(throttle: Duration) -> Self {
        Self {
            state: Mutex::new(None),
            throttle,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<OperationState>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Begin a new operation, replacing any previous one.
    pub fn start_operation(
        &self,
        kind: OperationKind,
        total: usize,
        label: impl Into<String>,
        callback: Option<ProgressCallback>,
    ) {
        let mut guard = self.lock();
        *guard = Some(OperationState {
            snapshot: ProgressSnapshot {
                kind,
                total_items: total,
                processed_items: 0,
                current_item: String::new(),
                label: label.into(),
                errors: 0,
                byte_progress: None,
                animation_tick: 0,
            },
            callback,
            last_emit: None,
        });
        self.emit(guard);
    }

    /// Replace the provisional total with the real one.
    pub fn update_operation_total(&self, total: usize, suffix: impl Into<String>) {
        let mut guard = self.lock();
        if let Some(state) = guard.as_mut() {
            state.snapshot.total_items = total;
            state.snapshot.label = suffix.into();
        }
        self.emit(guard);
    }

    /// Record the item currently being processed.
    pub fn update_progress(&self, current_item: &str, processed: usize) {
        let mut guard = self.lock();
        if let Some(state) = guard.as_mut() {
            state.snapshot.current_item = current_item.to_string();
            state.snapshot.processed_items = processed;
            // Byte sub-progress belongs to the previous file.
            state.snapshot.byte_progress = None;
        }
        self.emit_throttled(guard);
    }

    /// Advance the processed count without changing the display text.
    pub fn update_processed(&self, processed: usize) {
        let mut guard = self.lock();
        if let Some(state) = guard.as_mut() {
            state.snapshot.processed_items = processed;
        }
        self.emit_throttled(guard);
    }

    /// Byte-level sub-progress while a single large file streams.
    pub fn update_file_byte_progress(&self, done: u64, total: u64) {
        let mut guard = self.lock();
        if let Some(state) = guard.as_mut() {
            state.snapshot.byte_progress = Some((done, total));
        }
        self.emit_throttled(guard);
    }

    pub fn increment_errors(&self) {
        let mut guard = self.lock();
        if let Some(state) = guard.as_mut() {
            state.snapshot.errors += 1;
        }
        self.emit(guard);
    }

    /// Periodic no-op ping so a spinner keeps moving while the real total
    /// is still being computed.
    pub fn refresh_animation(&self) {
        let mut guard = self.lock();
        if let Some(state) = guard.as_mut() {
            state.snapshot.animation_tick += 1;
        }
        self.emit(guard);
    }

    /// Clear the operation so the UI shows no progress indicator.
    pub fn finish_operation(&self) {
        let mut guard = self.lock();
        *guard = None;
    }

    /// Latest snapshot of the active operation, if any.
    pub fn snapshot(&self) -> Option<ProgressSnapshot> {
        self.lock().as_ref().map(|state| state.snapshot.clone())
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    fn emit(&self, mut guard: MutexGuard<'_, Option<OperationState>>) {
        let pending = guard.as_mut().and_then(|state| {
            state.last_emit = Some(Instant::now());
            state
                .callback
                .clone()
                .map(|callback| (callback, state.snapshot.clone()))
        });
        // The lock is released before the callback runs, so an observer
        // may call back into the tracker (snapshot, cancellation, ...).
        drop(guard);
        if let Some((callback, snapshot)) = pending {
            callback(snapshot);
        }
    }

    fn emit_throttled(&self, guard: MutexGuard<'_, Option<OperationState>>) {
        let due = match guard.as_ref() {
            Some(state) => match state.last_emit {
                Some(at) => at.elapsed() >= self.throttle,
                None => true,
            },
            None => false,
        };
        if due {
            self.emit(guard);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
