//! Caller-supplied hooks invoked when operations complete.

use portage_vfs::VfsPath;

/// Marks directory-listing caches stale after an operation touches paths.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_for_copy(&self, _sources: &[VfsPath], _dest_dir: &VfsPath) {}
    fn invalidate_for_move(&self, _sources: &[VfsPath], _dest_dir: &VfsPath) {}
    fn invalidate_for_delete(&self, _sources: &[VfsPath]) {}
}

/// No-op invalidator for callers without a listing cache.
#[derive(Debug, Default)]
pub struct NullInvalidator;

impl CacheInvalidator for NullInvalidator {}

/// UI-side notifications issued by the engine after completion.
pub trait Notifier: Send + Sync {
    /// Re-read affected directory listings.
    fn refresh_files(&self) {}
    /// Request a redraw on the next render cycle.
    fn mark_dirty(&self) {}
    /// Clear the caller's current selection set.
    fn clear_selection(&self) {}
}

/// No-op notifier.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {}
