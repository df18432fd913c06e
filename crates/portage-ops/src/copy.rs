//! The copy operation.

use std::sync::Arc;

use portage_vfs::{VfsPath, VfsResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::transfer::copy_file_with_progress;
use crate::walk::{copy_tree_cross, copy_tree_same, WalkCtx};
use crate::worker::{count_item, resolve_totals, spawn_animation};
use crate::{
    CacheInvalidator, FileOperator, Notifier, OpContext, OpOptions, OperationKind,
    OperationOutcome, ProgressTracker,
};

impl FileOperator {
    /// Copy `sources` into `dest_dir` on a background worker.
    ///
    /// Returns immediately with the worker's handle; the worker publishes
    /// "Preparing to copy" progress, counts the sources, copies them, and
    /// resolves to the final [`OperationOutcome`].
    pub fn perform_copy(
        &self,
        sources: Vec<VfsPath>,
        dest_dir: VfsPath,
        options: OpOptions,
        ctx: Arc<OpContext>,
    ) -> JoinHandle<OperationOutcome> {
        if !options.continue_progress {
            ctx.begin();
            self.tracker.start_operation(
                OperationKind::Copy,
                1,
                format!("Preparing to copy to {}", dest_dir.name()),
                self.observer.clone(),
            );
        }
        // Continuation batches join a live operation whose spinner is
        // already being driven.
        let anim = if options.continue_progress {
            CancellationToken::new()
        } else {
            spawn_animation(Arc::clone(&self.tracker))
        };

        let worker = CopyWorker {
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
                    error!("Copy worker failed: {e}");
                    OperationOutcome::new(OperationKind::Copy, 0, 1, false)
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

struct CopyWorker {
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

enum CopyStatus {
    Copied,
    Skipped,
}

impl CopyWorker {
    fn run(self) -> OperationOutcome {
        let suffix = format!("to {}", self.dest_dir.name());
        let (mut processed, total) =
            resolve_totals(&self.tracker, &self.sources, self.continue_progress, &suffix);
        self.anim.cancel();

        // Single-item operations keep the destination label instead of
        // flashing per-item text.
        let w = WalkCtx {
            tracker: &self.tracker,
            op: &self.ctx,
            per_item: total > 1,
        };

        let mut copied = 0;
        let mut errors = 0;
        for source in &self.sources {
            if self.ctx.is_cancelled() {
                break;
            }
            let dest = self.dest_dir.join(source.name());
            let before = processed;
            match copy_one(source, &dest, self.overwrite, &mut processed, &w) {
                // A cancel that landed mid-item left it incomplete.
                Ok(CopyStatus::Copied) if !self.ctx.is_cancelled() => copied += 1,
                Ok(_) => {}
                Err(e) => {
                    error!("Error copying {source}: {e}");
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
        if copied > 0 {
            self.cache.invalidate_for_copy(&self.sources, &self.dest_dir);
            self.notifier.clear_selection();
        }
        self.notifier.refresh_files();
        self.notifier.mark_dirty();

        OperationOutcome::new(OperationKind::Copy, copied, errors, cancelled)
    }
}

fn copy_one(
    source: &VfsPath,
    dest: &VfsPath,
    overwrite: bool,
    processed: &mut usize,
    w: &WalkCtx<'_>,
) -> VfsResult<CopyStatus> {
    if dest.exists() && !overwrite {
        *processed += count_item(source);
        w.text(&format!("Skipped: {}", source.name()), *processed);
        info!("Skipped existing destination: {dest}");
        return Ok(CopyStatus::Skipped);
    }

    let cross = !source.same_scheme(dest);

    if source.is_symlink() && !cross {
        *processed += 1;
        w.text(&format!("Link: {}", source.name()), *processed);
        let target = source.read_link()?;
        if dest.exists() {
            dest.unlink()?;
        }
        dest.symlink_to(&target)?;
        info!("Copied symbolic link: {}", source.name());
    } else if source.is_dir() {
        // A symlink to a directory crossing schemes resolves here: the
        // destination has no symlink concept, so its resolved tree is
        // copied like any other directory.
        if dest.exists() && !dest.is_dir() {
            dest.unlink()?;
        }
        if cross {
            copy_tree_cross(source, dest, overwrite, processed, w)?;
        } else {
            copy_tree_same(source, dest, overwrite, processed, w)?;
        }
        info!("Copied directory: {}", source.name());
    } else {
        *processed += 1;
        w.text(&source.name(), *processed);
        copy_file_with_progress(source, dest, overwrite, w.tracker, w.op)?;
        info!("Copied file: {}", source.name());
    }
    Ok(CopyStatus::Copied)
}
