//! Recursive directory-tree helpers shared by the operation workers.
//!
//! Per-file failures inside a tree are logged and counted on the tracker
//! but never abort the walk; only failures to enumerate or create the
//! tree roots propagate to the caller.

use portage_vfs::{BulkDelete, VfsPath, VfsResult, BULK_DELETE_BATCH};
use tracing::{error, warn};

use crate::transfer::copy_file_with_progress;
use crate::{OpContext, ProgressTracker};

/// Shared state threaded through tree walks.
pub(crate) struct WalkCtx<'a> {
    pub tracker: &'a ProgressTracker,
    pub op: &'a OpContext,
    /// Whether per-item progress text is shown (copy/move suppress it for
    /// single-item operations; delete never does).
    pub per_item: bool,
}

impl WalkCtx<'_> {
    pub fn text(&self, label: &str, processed: usize) {
        if self.per_item {
            self.tracker.update_progress(label, processed);
        } else {
            self.tracker.update_processed(processed);
        }
    }
}

/// Display name of a path relative to the tree root.
fn rel_display(path: &VfsPath, root: &VfsPath) -> String {
    path.relative_to(root)
        .map(|p| p.display().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| path.name())
}

/// Same-backend directory copy: depth-first walk mirroring the directory
/// structure, recreating symbolic links instead of copying their targets.
pub(crate) fn copy_tree_same(
    src_dir: &VfsPath,
    dest_dir: &VfsPath,
    overwrite: bool,
    processed: &mut usize,
    w: &WalkCtx<'_>,
) -> VfsResult<()> {
    dest_dir.mkdir(true, true)?;

    let mut stack = vec![(src_dir.clone(), dest_dir.clone())];
    while let Some((dir, ddir)) = stack.pop() {
        if w.op.is_cancelled() {
            return Ok(());
        }
        if let Err(e) = ddir.mkdir(true, true) {
            error!("Error creating directory {ddir}: {e}");
            w.tracker.increment_errors();
            continue;
        }
        let children = match dir.read_dir() {
            Ok(children) => children,
            Err(e) => {
                error!("Error reading directory {dir}: {e}");
                w.tracker.increment_errors();
                continue;
            }
        };
        for child in children {
            if w.op.is_cancelled() {
                return Ok(());
            }
            let child_dest = ddir.join(child.name());
            if child.is_symlink() {
                *processed += 1;
                w.text(
                    &format!("Link: {}", rel_display(&child, src_dir)),
                    *processed,
                );
                let recreated = child
                    .read_link()
                    .and_then(|target| child_dest.symlink_to(&target));
                if let Err(e) = recreated {
                    error!("Error copying symlink {child}: {e}");
                    w.tracker.increment_errors();
                }
            } else if child.is_dir() {
                stack.push((child, child_dest));
            } else {
                *processed += 1;
                w.text(&rel_display(&child, src_dir), *processed);
                if let Err(e) =
                    copy_file_with_progress(&child, &child_dest, overwrite, w.tracker, w.op)
                {
                    error!("Error copying {child}: {e}");
                    w.tracker.increment_errors();
                }
            }
        }
    }
    Ok(())
}

/// Cross-backend directory copy: flattened recursive enumeration with
/// path-relative destination placement. Subdirectory recreation is
/// implicit in per-file destination paths.
pub(crate) fn copy_tree_cross(
    src_dir: &VfsPath,
    dest_dir: &VfsPath,
    overwrite: bool,
    processed: &mut usize,
    w: &WalkCtx<'_>,
) -> VfsResult<()> {
    dest_dir.mkdir(true, true)?;

    for item in src_dir.rglob()? {
        if w.op.is_cancelled() {
            return Ok(());
        }
        let display = rel_display(&item, src_dir);
        let dest_item = match item.relative_to(src_dir) {
            Some(rel) => dest_dir.join(rel),
            None => dest_dir.join(item.name()),
        };

        *processed += 1;
        w.text(&display, *processed);

        if let Some(parent) = dest_item.parent() {
            if let Err(e) = parent.mkdir(true, true) {
                error!("Error creating directory {parent}: {e}");
                w.tracker.increment_errors();
                continue;
            }
        }
        if let Err(e) = copy_file_with_progress(&item, &dest_item, overwrite, w.tracker, w.op) {
            error!("Error copying {item}: {e}");
            w.tracker.increment_errors();
        }
    }
    Ok(())
}

/// Recursive directory delete.
///
/// Prefers the backend's bulk-delete capability when advertised;
/// otherwise walks bottom-up so every directory is empty by the time it
/// is removed.
pub(crate) fn delete_tree(
    dir: &VfsPath,
    processed: &mut usize,
    w: &WalkCtx<'_>,
) -> VfsResult<()> {
    if let Some(bulk) = dir.bulk_delete() {
        return delete_tree_bulk(dir, bulk, processed, w);
    }
    delete_tree_walk(dir, dir, processed, w)
}

fn delete_tree_walk(
    dir: &VfsPath,
    root: &VfsPath,
    processed: &mut usize,
    w: &WalkCtx<'_>,
) -> VfsResult<()> {
    let children = dir.read_dir()?;
    for child in children {
        if w.op.is_cancelled() {
            return Ok(());
        }
        if child.is_symlink() {
            // A symlink to a directory is one unit of work, not a tree.
            *processed += 1;
            w.text(&format!("Link: {}", rel_display(&child, root)), *processed);
            if let Err(e) = child.unlink() {
                error!("Error deleting {child}: {e}");
                w.tracker.increment_errors();
            }
        } else if child.is_dir() {
            if let Err(e) = delete_tree_walk(&child, root, processed, w) {
                error!("Error deleting directory {child}: {e}");
                w.tracker.increment_errors();
            }
        } else {
            *processed += 1;
            w.text(&rel_display(&child, root), *processed);
            match child.unlink() {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    warn!("File not found (already deleted?): {}", child.name());
                }
                Err(e) => {
                    error!("Error deleting {child}: {e}");
                    w.tracker.increment_errors();
                }
            }
        }
    }

    if w.op.is_cancelled() {
        return Ok(());
    }
    if let Err(e) = dir.rmdir() {
        // Bottom-up ordering should have emptied it; a concurrent external
        // mutation can still race us, so fall back to a forced remove.
        if let Err(forced) = dir.remove_dir_all() {
            warn!("Could not remove directory {dir}: {e}; forced removal failed: {forced}");
        }
    }
    Ok(())
}

fn delete_tree_bulk(
    dir: &VfsPath,
    bulk: &dyn BulkDelete,
    processed: &mut usize,
    w: &WalkCtx<'_>,
) -> VfsResult<()> {
    let keys = bulk.list_keys(dir.as_path())?;
    let mut batch = Vec::new();
    for key in keys {
        if w.op.is_cancelled() {
            return Ok(());
        }
        *processed += 1;
        let display = key
            .strip_prefix(dir.as_path())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| key.display().to_string());
        w.text(&display, *processed);

        batch.push(key);
        if batch.len() >= BULK_DELETE_BATCH {
            if w.op.is_cancelled() {
                return Ok(());
            }
            if let Err(e) = bulk.delete_batch(&batch) {
                error!("Error deleting batch under {dir}: {e}");
                w.tracker.increment_errors();
            }
            batch.clear();
        }
    }
    if !batch.is_empty() && !w.op.is_cancelled() {
        if let Err(e) = bulk.delete_batch(&batch) {
            error!("Error deleting batch under {dir}: {e}");
            w.tracker.increment_errors();
        }
    }
    let _ = dir.rmdir();
    Ok(())
}
