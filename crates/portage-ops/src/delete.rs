//! The delete operation.

use std::sync::Arc;

use portage_vfs::{VfsPath, VfsResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::walk::{delete_tree, WalkCtx};
use crate::worker::{count_item, resolve_totals, spawn_animation};
use crate::{
    CacheInvalidator, FileOperator, Notifier, OpContext, OpOptions, OperationKind,
    OperationOutcome, ProgressTracker,
};

impl FileOperator {
    /// Delete `sources` on a background worker.
    ///
    /// An item that turns out to be already gone is logged as a warning
    /// and counted as deleted, since the end state matches intent.
    pub fn perform_delete(
        &self,
        sources: Vec<VfsPath>,
        options: OpOptions,
        ctx: Arc<OpContext>,
    ) -> JoinHandle<OperationOutcome> {
        if !options.continue_progress {
            ctx.begin();
            self.tracker.start_operation(
                OperationKind::Delete,
                1,
                "Preparing to delete",
                self.observer.clone(),
            );
        }
        let anim = if options.continue_progress {
            CancellationToken::new()
        } else {
            spawn_animation(Arc::clone(&self.tracker))
        };

        let worker = DeleteWorker {
            tracker: Arc::clone(&self.tracker),
            cache: Arc::clone(&self.cache),
            notifier: Arc::clone(&self.notifier),
            ctx: Arc::clone(&ctx),
            anim: anim.clone(),
            sources,
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
                    error!("Delete worker failed: {e}");
                    OperationOutcome::new(OperationKind::Delete, 0, 1, false)
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

struct DeleteWorker {
    tracker: Arc<ProgressTracker>,
    cache: Arc<dyn CacheInvalidator>,
    notifier: Arc<dyn Notifier>,
    ctx: Arc<OpContext>,
    anim: CancellationToken,
    sources: Vec<VfsPath>,
    continue_progress: bool,
}

impl DeleteWorker {
    fn run(self) -> OperationOutcome {
        let (mut processed, _total) =
            resolve_totals(&self.tracker, &self.sources, self.continue_progress, "");
        self.anim.cancel();

        // Delete always shows per-item text; there is no destination
        // suffix to hold the line steady for.
        let w = WalkCtx {
            tracker: &self.tracker,
            op: &self.ctx,
            per_item: true,
        };

        let mut deleted = 0;
        let mut errors = 0;
        for source in &self.sources {
            if self.ctx.is_cancelled() {
                break;
            }
            let before = processed;
            match delete_one(source, &mut processed, &w) {
                Ok(()) if !self.ctx.is_cancelled() => deleted += 1,
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    warn!("File not found (already deleted?): {}", source.name());
                    deleted += 1;
                }
                Err(e) => {
                    error!("Error deleting {source}: {e}");
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
        if deleted > 0 {
            self.cache.invalidate_for_delete(&self.sources);
        }
        self.notifier.refresh_files();
        self.notifier.mark_dirty();

        OperationOutcome::new(OperationKind::Delete, deleted, errors, cancelled)
    }
}

fn delete_one(source: &VfsPath, processed: &mut usize, w: &WalkCtx<'_>) -> VfsResult<()> {
    if source.is_symlink() {
        *processed += 1;
        w.text(&format!("Link: {}", source.name()), *processed);
        source.unlink()?;
        info!("Deleted symbolic link: {}", source.name());
    } else if source.is_dir() {
        match delete_tree(source, processed, w) {
            Ok(()) => {}
            Err(e) => {
                // Could not even enumerate the root; a forced remove is
                // the last resort, and the unreadable directory was
                // pre-counted as a single item.
                warn!("Falling back to forced removal of {source}: {e}");
                source.remove_dir_all()?;
                *processed += 1;
                w.text(&source.name(), *processed);
            }
        }
        info!("Deleted directory: {}", source.name());
    } else {
        // Regular file, or a source that vanished after counting; the
        // unlink itself reports NotFound for the latter.
        *processed += 1;
        w.text(&source.name(), *processed);
        source.unlink()?;
        info!("Deleted file: {}", source.name());
    }
    Ok(())
}
