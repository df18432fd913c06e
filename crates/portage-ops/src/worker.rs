//! Helpers shared by the copy/move/delete workers.

use std::sync::Arc;
use std::time::Duration;

use portage_vfs::VfsPath;
use tokio_util::sync::CancellationToken;

use crate::count::count_files_recursively;
use crate::ProgressTracker;

/// Spawn the indeterminate-phase animation loop.
///
/// While the worker counts files the item total is still provisional, so
/// this task pings the tracker every 100ms to keep a spinner moving. The
/// worker cancels the returned token once the real total is published.
pub(crate) fn spawn_animation(tracker: Arc<ProgressTracker>) -> CancellationToken {
    let token = CancellationToken::new();
    let stop = token.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => tracker.refresh_animation(),
            }
        }
    });
    token
}

/// Count the sources and publish the real total.
///
/// For a fresh operation the total is clamped to at least 1 so the
/// "Preparing" placeholder never regresses to an empty bar. For a
/// continuation batch the new items are added onto the totals already on
/// the tracker and processing resumes from the prior count.
pub(crate) fn resolve_totals(
    tracker: &ProgressTracker,
    sources: &[VfsPath],
    continue_progress: bool,
    suffix: &str,
) -> (usize, usize) {
    let counted = count_files_recursively(sources);
    if continue_progress {
        if let Some(snap) = tracker.snapshot() {
            let total = snap.total_items + counted;
            tracker.update_operation_total(total, suffix);
            return (snap.processed_items, total);
        }
    }
    let total = counted.max(1);
    tracker.update_operation_total(total, suffix);
    (0, total)
}

/// How many work units a single top-level item represents, used to keep
/// the processed count consistent when an item fails wholesale.
pub(crate) fn count_item(path: &VfsPath) -> usize {
    if path.is_file() || path.is_symlink() {
        1
    } else if path.is_dir() {
        count_files_recursively(std::slice::from_ref(path))
    } else {
        0
    }
}
