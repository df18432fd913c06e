//! End-to-end tests for the copy/move/delete workers.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portage_ops::{
    FileOperator, OpContext, OpOptions, ProgressCallback, ProgressSnapshot, ProgressTracker,
    CHUNK_SIZE, STREAM_THRESHOLD,
};
use portage_vfs::{MemoryBackend, VfsPath, ZipBackend};

fn operator() -> FileOperator {
    FileOperator::new(Arc::new(ProgressTracker::with_throttle(Duration::ZERO)))
}

/// Observer that records every snapshot it sees.
fn recording() -> (ProgressCallback, Arc<Mutex<Vec<ProgressSnapshot>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let callback: ProgressCallback = Arc::new(move |snap| sink.lock().unwrap().push(snap));
    (callback, log)
}

fn write_file(path: &Path, data: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, data).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_flat_copy_reports_counts_and_callback() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/a.txt"), b"aaaaa");
    write_file(&dir.path().join("src/b.txt"), b"bbbbb");
    std::fs::create_dir(dir.path().join("dst")).unwrap();

    let (observer, log) = recording();
    let op = operator().with_observer(observer);
    let completion = Arc::new(Mutex::new(None));
    let completion_sink = Arc::clone(&completion);

    let sources = vec![
        VfsPath::local(dir.path().join("src/a.txt")),
        VfsPath::local(dir.path().join("src/b.txt")),
    ];
    let dest = VfsPath::local(dir.path().join("dst"));
    let options = OpOptions::new()
        .on_completion(move |ok, err| *completion_sink.lock().unwrap() = Some((ok, err)));

    let outcome = op
        .perform_copy(sources, dest, options, OpContext::new())
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.errors, 0);
    assert!(!outcome.cancelled);
    assert_eq!(*completion.lock().unwrap(), Some((2, 0)));
    assert_eq!(
        std::fs::read(dir.path().join("dst/a.txt")).unwrap(),
        b"aaaaa"
    );
    assert_eq!(
        std::fs::read(dir.path().join("dst/b.txt")).unwrap(),
        b"bbbbb"
    );

    // Count consistency: the last observed processed count equals the
    // pre-computed total.
    let snaps = log.lock().unwrap();
    let last = snaps.last().unwrap();
    assert_eq!(last.processed_items, 2);
    assert_eq!(last.total_items, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_progress_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        write_file(&dir.path().join(format!("src/f{i}.txt")), b"x");
    }
    std::fs::create_dir(dir.path().join("dst")).unwrap();

    let (observer, log) = recording();
    let op = operator().with_observer(observer);
    op.perform_copy(
        vec![VfsPath::local(dir.path().join("src"))],
        VfsPath::local(dir.path().join("dst")),
        OpOptions::new(),
        OpContext::new(),
    )
    .await
    .unwrap();

    let snaps = log.lock().unwrap();
    let mut prev = 0;
    for snap in snaps.iter() {
        assert!(snap.processed_items >= prev, "processed count regressed");
        prev = snap.processed_items;
    }
    assert_eq!(prev, 20);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_skip_leaves_existing_destination_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/a.txt"), b"new");
    write_file(&dir.path().join("dst/a.txt"), b"old");

    let op = operator();
    let outcome = op
        .perform_copy(
            vec![VfsPath::local(dir.path().join("src/a.txt"))],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 0);
    assert_eq!(outcome.errors, 0);
    assert_eq!(outcome.summary(), "No items copied");
    assert_eq!(std::fs::read(dir.path().join("dst/a.txt")).unwrap(), b"old");
    assert_eq!(std::fs::read(dir.path().join("src/a.txt")).unwrap(), b"new");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_overwrite_replaces_destination() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/a.txt"), b"new");
    write_file(&dir.path().join("dst/a.txt"), b"old");

    let op = operator();
    let outcome = op
        .perform_copy(
            vec![VfsPath::local(dir.path().join("src/a.txt"))],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new().with_overwrite(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(std::fs::read(dir.path().join("dst/a.txt")).unwrap(), b"new");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_move_with_overwrite_removes_source() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/a.txt"), b"new");
    write_file(&dir.path().join("dst/a.txt"), b"old");

    let op = operator();
    let outcome = op
        .perform_move(
            vec![VfsPath::local(dir.path().join("src/a.txt"))],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new().with_overwrite(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert!(!dir.path().join("src/a.txt").exists());
    assert_eq!(std::fs::read(dir.path().join("dst/a.txt")).unwrap(), b"new");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_move_directory_same_scheme() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/tree/a.txt"), b"a");
    write_file(&dir.path().join("src/tree/sub/b.txt"), b"b");
    std::fs::create_dir(dir.path().join("dst")).unwrap();

    let op = operator();
    let outcome = op
        .perform_move(
            vec![VfsPath::local(dir.path().join("src/tree"))],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert!(!dir.path().join("src/tree").exists());
    assert_eq!(
        std::fs::read(dir.path().join("dst/tree/sub/b.txt")).unwrap(),
        b"b"
    );
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_directory_delete_with_nested_symlink() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("other/o.txt"), b"o");
    write_file(&dir.path().join("dir/f1.txt"), b"f1");
    std::os::unix::fs::symlink(dir.path().join("other"), dir.path().join("dir/link")).unwrap();

    let (observer, log) = recording();
    let op = operator().with_observer(observer);
    let outcome = op
        .perform_delete(
            vec![VfsPath::local(dir.path().join("dir"))],
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors, 0);
    assert!(!dir.path().join("dir").exists());
    // The link target was not followed.
    assert!(dir.path().join("other/o.txt").exists());

    // f1.txt plus the link count as two units of work.
    let snaps = log.lock().unwrap();
    let last = snaps.last().unwrap();
    assert_eq!(last.processed_items, 2);
    assert_eq!(last.total_items, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_missing_path_is_a_warning_not_an_error() {
    let dir = tempfile::tempdir().unwrap();

    let op = operator();
    let outcome = op
        .perform_delete(
            vec![VfsPath::local(dir.path().join("missing.txt"))],
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    // The end state matches intent, so the item counts as deleted.
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_mid_large_copy_cleans_up_destination() {
    let dir = tempfile::tempdir().unwrap();
    let payload = vec![3u8; STREAM_THRESHOLD as usize + 4 * CHUNK_SIZE];
    write_file(&dir.path().join("src/big.bin"), &payload);
    std::fs::create_dir(dir.path().join("dst")).unwrap();

    let ctx = OpContext::new();
    let cancel_ctx = Arc::clone(&ctx);
    let observer: ProgressCallback = Arc::new(move |snap: ProgressSnapshot| {
        // Pull the plug as soon as the first chunk lands.
        if snap.byte_progress.is_some() {
            cancel_ctx.request_cancel();
        }
    });

    let op = operator().with_observer(observer);
    let outcome = op
        .perform_copy(
            vec![VfsPath::local(dir.path().join("src/big.bin"))],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new(),
            ctx,
        )
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.succeeded, 0);
    assert!(!dir.path().join("dst/big.bin").exists());
    assert_eq!(
        outcome.summary(),
        "Copy cancelled: 0 items copied before cancellation"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_request_after_finish_has_no_effect() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/a.txt"), b"a");
    std::fs::create_dir(dir.path().join("dst")).unwrap();

    let op = operator();
    let ctx = OpContext::new();
    op.perform_copy(
        vec![VfsPath::local(dir.path().join("src/a.txt"))],
        VfsPath::local(dir.path().join("dst")),
        OpOptions::new(),
        Arc::clone(&ctx),
    )
    .await
    .unwrap();

    // A stale cancel between operations must not poison the next one.
    ctx.request_cancel();
    write_file(&dir.path().join("src/b.txt"), b"b");
    let outcome = op
        .perform_copy(
            vec![VfsPath::local(dir.path().join("src/b.txt"))],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new(),
            ctx,
        )
        .await
        .unwrap();

    assert!(!outcome.cancelled);
    assert_eq!(outcome.succeeded, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cross_backend_directory_copy_to_object_store() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("tree/a.txt"), b"a");
    write_file(&dir.path().join("tree/sub/b.txt"), b"bb");

    let store = MemoryBackend::new();
    let op = operator();
    let outcome = op
        .perform_copy(
            vec![VfsPath::local(dir.path().join("tree"))],
            store.root(),
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors, 0);
    assert_eq!(store.object_count(), 2);
    assert_eq!(
        store.root().join("tree/sub/b.txt").read_bytes().unwrap(),
        b"bb"
    );
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_cross_backend_symlink_to_directory_copies_resolved_tree() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("real/inner.txt"), b"resolved");
    std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

    let store = MemoryBackend::new();
    let op = operator();
    let outcome = op
        .perform_copy(
            vec![VfsPath::local(dir.path().join("link"))],
            store.root(),
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    // The destination has no symlink concept, so the link's resolved
    // content lands instead of a link artifact.
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors, 0);
    assert_eq!(store.object_count(), 1);
    assert_eq!(
        store.root().join("link/inner.txt").read_bytes().unwrap(),
        b"resolved"
    );
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_cross_backend_move_of_symlink_keeps_target() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("real/inner.txt"), b"resolved");
    std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

    let store = MemoryBackend::new();
    let op = operator();
    let outcome = op
        .perform_move(
            vec![VfsPath::local(dir.path().join("link"))],
            store.root(),
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors, 0);
    assert_eq!(
        store.root().join("link/inner.txt").read_bytes().unwrap(),
        b"resolved"
    );
    // The link itself is gone but its target survives.
    assert!(std::fs::symlink_metadata(dir.path().join("link")).is_err());
    assert!(dir.path().join("real/inner.txt").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_overwrite_merge_replaces_nested_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/tree/a.txt"), b"new");
    write_file(&dir.path().join("src/tree/b.txt"), b"added");
    write_file(&dir.path().join("dst/tree/a.txt"), b"old");

    let op = operator();
    let outcome = op
        .perform_copy(
            vec![VfsPath::local(dir.path().join("src/tree"))],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new().with_overwrite(),
            OpContext::new(),
        )
        .await
        .unwrap();

    // The existing destination directory is merged into, with the
    // overwrite flag carried down to nested conflicts.
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors, 0);
    assert_eq!(std::fs::read(dir.path().join("dst/tree/a.txt")).unwrap(), b"new");
    assert_eq!(
        std::fs::read(dir.path().join("dst/tree/b.txt")).unwrap(),
        b"added"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bulk_delete_on_object_store() {
    let store = MemoryBackend::new();
    for i in 0..25 {
        store
            .root()
            .join(format!("data/k{i}"))
            .write_bytes(b"v")
            .unwrap();
    }
    store.root().join("keep.txt").write_bytes(b"keep").unwrap();

    let op = operator();
    let outcome = op
        .perform_delete(
            vec![store.root().join("data")],
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors, 0);
    // Only the prefix was removed.
    assert_eq!(store.object_count(), 1);
    assert!(store.root().join("keep.txt").is_file());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cross_backend_move_is_not_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("fixture.zip");
    write_zip_fixture(&zip_path);
    std::fs::create_dir(dir.path().join("dst")).unwrap();

    let archive = ZipBackend::open(&zip_path).unwrap();
    let op = operator();
    let outcome = op
        .perform_move(
            vec![archive.root().join("top.txt")],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new(),
            OpContext::new(),
        )
        .await
        .unwrap();

    // The copy landed but the read-only source could not be removed:
    // both copies remain and the item still counts as moved.
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors, 0);
    assert_eq!(
        std::fs::read(dir.path().join("dst/top.txt")).unwrap(),
        b"hello from the archive"
    );
    assert!(archive.root().join("top.txt").is_file());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_continuation_batch_extends_running_totals() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/c.txt"), b"c");
    write_file(&dir.path().join("src/d.txt"), b"d");
    std::fs::create_dir(dir.path().join("dst")).unwrap();

    let tracker = Arc::new(ProgressTracker::with_throttle(Duration::ZERO));
    // An operation is already underway: 3 items total, 1 done.
    tracker.start_operation(portage_ops::OperationKind::Copy, 3, "Preparing", None);
    tracker.update_progress("first.txt", 1);

    let op = FileOperator::new(Arc::clone(&tracker));
    let outcome = op
        .perform_copy(
            vec![
                VfsPath::local(dir.path().join("src/c.txt")),
                VfsPath::local(dir.path().join("src/d.txt")),
            ],
            VfsPath::local(dir.path().join("dst")),
            OpOptions::new().continuing(),
            OpContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 2);
    // The continuation added onto the running operation instead of
    // replacing it, and did not finish it.
    let snap = tracker.snapshot().expect("operation still active");
    assert_eq!(snap.total_items, 5);
    assert_eq!(snap.processed_items, 3);
}

fn write_zip_fixture(path: &Path) {
    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("top.txt", options).unwrap();
    writer.write_all(b"hello from the archive").unwrap();
    writer.finish().unwrap();
}
