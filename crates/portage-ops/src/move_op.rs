//! The move operation.

use std::sync::Arc;

use portage_vfs::{VfsPath, VfsResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::transfer::copy_file_with_progress;
use crate::walk::{copy_tree_cross, copy_tree_same, WalkCtx};
use crate::worker::{count_item, resolve_totals, spawn_animation};
use crate::{
    CacheInvalidator, FileOperator, Notifier, OpContext, OpOptions, OperationKind,
    OperationOutcome, ProgressTracker,
};

impl FileOperator {
    /// Move `sources` into `dest_dir` on a background worker.
    ///
    /// Same-scheme moves rename; cross-scheme moves copy then delete the
    /// source, which is not atomic: if the source cannot be removed after
    /// a successful copy, both copies remain and the item still counts as
    /// moved because no data was lost.
    pub fn perform_move(
        &self,
        sources: Vec<VfsPath>,
        dest_dir: VfsPath,
        options: OpOptions,
        ctx: Arc<OpContext>,
    ) -> JoinHandle<OperationOutcome> {
        if !options.continue_progress {
            ctx.begin();
            self.tracker.start_operation(
                OperationKind::Move,
                1,
                format!("Preparing to move to {}", dest_dir.name()),
                self.observer.clone(),
            );
        }
        let anim = if options.continue_progress {
            CancellationToken::new()
        } else {
            spawn_animation(Arc::clone(&self.tracker))
        };

        let worker = MoveWorker {
            tracker: Arc::clone(&self.tracker),
            cache: Arc::clone(&self.cache),
            notifier: Arc::clone(&self.notifier),
            ctx: Arc::clone(&ctx),
            anim: anim.clone(),
            sources,
            dest_dir,
            overwrite: options.overwrite,
            continue_progress: options.continue_progress,
        };
        let completion = options.completion;
        let tracker = Arc::clone(&self.tracker);

        tokio::spawn(async move {
            let outcome = match tokio::task::spawn_blocking(move || worker.run()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    anim.cancel();
                    tracker.finish_operation();
                    ctx.end();
                    error!("Move worker failed: {e}");
                    OperationOutcome::new(OperationKind::Move, 0, 1, false)
                }
            };
            match completion {
                Some(callback) => callback(outcome.succeeded, outcome.errors),
                None => outcome.log(),
            }
            outcome
        })
    }
}

struct MoveWorker {
    tracker: Arc<ProgressTracker>,
    cache: Arc<dyn CacheInvalidator>,
    notifier: Arc<dyn Notifier>,
    ctx: Arc<OpContext>,
    anim: CancellationToken,
    sources: Vec<VfsPath>,
    dest_dir: VfsPath,
    overwrite: bool,
    continue_progress: bool,
}

enum MoveStatus {
    Moved,
    Skipped,
}

impl MoveWorker {
    fn run(self) -> OperationOutcome {
        let suffix = format!("to {}", self.dest_dir.name());
        let (mut processed, total) =
            resolve_totals(&self.tracker, &self.sources, self.continue_progress, &suffix);
        self.anim.cancel();

        let w = WalkCtx {
            tracker: &self.tracker,
            op: &self.ctx,
            per_item: total > 1,
        };

        let mut moved = 0;
        let mut errors = 0;
        for source in &self.sources {
            if self.ctx.is_cancelled() {
                break;
            }
            let dest = self.dest_dir.join(source.name());
            let before = processed;
            match move_one(source, &dest, self.overwrite, &mut processed, &w) {
                Ok(MoveStatus::Moved) if !self.ctx.is_cancelled() => moved += 1,
                Ok(_) => {}
                Err(e) => {
                    error!("Error moving {source}: {e}");
                    errors += 1;
                    self.tracker.increment_errors();
                    // A failed item still counts fully toward progress.
                    processed = processed.max(before + count_item(source));
                    self.tracker.update_processed(processed);
                }
            }
        }

        let cancelled = self.ctx.is_cancelled();
        if !self.continue_progress {
            self.tracker.finish_operation();
            self.ctx.end();
        }
        if moved > 0 {
            self.cache.invalidate_for_move(&self.sources, &self.dest_dir);
            self.notifier.clear_selection();
        }
        self.notifier.refresh_files();
        self.notifier.mark_dirty();

        OperationOutcome::new(OperationKind::Move, moved, errors, cancelled)
    }
}

fn move_one(
    source: &VfsPath,
    dest: &VfsPath,
    overwrite: bool,
    processed: &mut usize,
    w: &WalkCtx<'_>,
) -> VfsResult<MoveStatus> {
    if dest.exists() {
        if !overwrite {
            *processed += count_item(source);
            w.text(&format!("Skipped: {}", source.name()), *processed);
            info!("Skipped existing destination: {dest}");
            return Ok(MoveStatus::Skipped);
        }
        if dest.is_dir() && !dest.is_symlink() {
            dest.remove_dir_all()?;
        } else {
            dest.unlink()?;
        }
    }

    let cross = !source.same_scheme(dest);

    if source.is_symlink() && !cross {
        *processed += 1;
        w.text(&format!("Link: {}", source.name()), *processed);
        let target = source.read_link()?;
        dest.symlink_to(&target)?;
        source.unlink()?;
        info!("Moved symbolic link: {}", source.name());
        return Ok(MoveStatus::Moved);
    }

    // A symlink to a directory reaching this point is crossing schemes
    // and moves as its resolved tree.
    if source.is_dir() {
        return move_directory(source, dest, cross, processed, w);
    }

    // Regular file, or a symlink crossing schemes (its resolved content
    // moves, since the destination has no symlink concept).
    *processed += 1;
    w.text(&source.name(), *processed);
    if cross {
        copy_file_with_progress(source, dest, true, w.tracker, w.op)?;
        if w.op.is_cancelled() {
            // The partial destination was cleaned up; keep the source.
            return Ok(MoveStatus::Skipped);
        }
        if let Err(e) = source.unlink() {
            warn!(
                "Moved {} but could not remove source: {e}",
                source.name()
            );
        }
        info!("Moved file (cross-storage): {}", source.name());
    } else {
        match source.rename(dest) {
            Ok(()) => {}
            Err(e) => {
                // Rename can fail across filesystem boundaries within one
                // scheme; fall back to copy-then-delete.
                debug!("rename failed for {source} ({e}), copying instead");
                copy_file_with_progress(source, dest, true, w.tracker, w.op)?;
                if w.op.is_cancelled() {
                    return Ok(MoveStatus::Skipped);
                }
                source.unlink()?;
            }
        }
        info!("Moved file: {}", source.name());
    }
    Ok(MoveStatus::Moved)
}

fn move_directory(
    source: &VfsPath,
    dest: &VfsPath,
    cross: bool,
    processed: &mut usize,
    w: &WalkCtx<'_>,
) -> VfsResult<MoveStatus> {
    if cross {
        copy_tree_cross(source, dest, true, processed, w)?;
        if w.op.is_cancelled() {
            // Incomplete copy; the source stays put.
            return Ok(MoveStatus::Skipped);
        }
        let removed = if source.is_symlink() {
            // Only the link itself goes; its target is untouched.
            source.unlink()
        } else {
            source.remove_dir_all()
        };
        if let Err(e) = removed {
            // The data is safe at the destination; both copies remain.
            warn!(
                "Moved {} but could not remove source: {e}",
                source.name()
            );
        }
        info!("Moved directory (cross-storage): {}", source.name());
        return Ok(MoveStatus::Moved);
    }

    let units = count_item(source);
    match source.rename(dest) {
        Ok(()) => {
            *processed += units;
            w.text(&source.name(), *processed);
        }
        Err(e) => {
            debug!("rename failed for {source} ({e}), copying instead");
            copy_tree_same(source, dest, true, processed, w)?;
            if w.op.is_cancelled() {
                return Ok(MoveStatus::Skipped);
            }
            source.remove_dir_all()?;
        }
    }
    info!("Moved directory: {}", source.name());
    Ok(MoveStatus::Moved)
}
