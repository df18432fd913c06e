//! The `VfsPath` handle and the backend contract it delegates to.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Scheme, VfsError, VfsResult};

/// Contract every storage backend implements.
///
/// Methods take plain paths; `VfsPath` pairs a backend with a path and is
/// the type the rest of the system works with.
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Which scheme this backend serves.
    fn scheme(&self) -> Scheme;

    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_symlink(&self, path: &Path) -> bool;
    fn exists(&self, path: &Path) -> bool;

    /// Size of a file in bytes.
    fn size(&self, path: &Path) -> VfsResult<u64>;

    /// Immediate children of a directory.
    fn read_dir(&self, path: &Path) -> VfsResult<Vec<PathBuf>>;

    /// All files under a directory, recursively.
    ///
    /// Symbolic links to directories are not descended into. Backends with
    /// flat namespaces override this with a prefix scan.
    fn rglob(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut stack = vec![path.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for child in self.read_dir(&dir)? {
                if self.is_dir(&child) && !self.is_symlink(&child) {
                    stack.push(child);
                } else if self.is_file(&child) {
                    files.push(child);
                }
            }
        }
        Ok(files)
    }

    /// Same-backend whole-file copy primitive.
    fn native_copy(&self, from: &Path, to: &Path) -> VfsResult<()>;

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;
    fn unlink(&self, path: &Path) -> VfsResult<()>;
    fn rmdir(&self, path: &Path) -> VfsResult<()>;
    fn remove_dir_all(&self, path: &Path) -> VfsResult<()>;
    fn mkdir(&self, path: &Path, parents: bool, exist_ok: bool) -> VfsResult<()>;

    fn read_link(&self, path: &Path) -> VfsResult<PathBuf>;
    fn symlink(&self, target: &Path, link: &Path) -> VfsResult<()>;

    /// Open a file for streaming reads.
    fn open_read(&self, path: &Path) -> VfsResult<Box<dyn Read + Send>>;

    /// Open a file for streaming writes.
    ///
    /// Returns `Ok(None)` when the backend has no streaming upload path,
    /// in which case callers fall back to the whole-file copy primitive.
    fn open_write(&self, path: &Path) -> VfsResult<Option<Box<dyn Write + Send>>>;

    fn read_bytes(&self, path: &Path) -> VfsResult<Vec<u8>>;
    fn write_bytes(&self, path: &Path, data: &[u8]) -> VfsResult<()>;

    /// Copy filesystem metadata (permissions) between two paths.
    ///
    /// Only meaningful for the local backend; others ignore it.
    fn copy_metadata(&self, _from: &Path, _to: &Path) -> VfsResult<()> {
        Ok(())
    }

    /// Optional batched-removal capability.
    fn bulk_delete(&self) -> Option<&dyn BulkDelete> {
        None
    }
}

/// Batched removal for backends where per-object deletes are expensive.
pub trait BulkDelete: Send + Sync {
    /// All object keys under a prefix, in listing order.
    fn list_keys(&self, prefix: &Path) -> VfsResult<Vec<PathBuf>>;

    /// Delete a batch of keys in one request.
    fn delete_batch(&self, keys: &[PathBuf]) -> VfsResult<()>;
}

/// A path bound to a storage backend.
#[derive(Clone)]
pub struct VfsPath {
    backend: Arc<dyn Backend>,
    path: PathBuf,
}

impl VfsPath {
    /// Create a path on the given backend.
    pub fn new(backend: Arc<dyn Backend>, path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            path: path.into(),
        }
    }

    /// The scheme of the owning backend.
    pub fn scheme(&self) -> Scheme {
        self.backend.scheme()
    }

    /// The raw path within the backend.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// Final path component, lossily converted for display.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Append a component, staying on the same backend.
    pub fn join(&self, segment: impl AsRef<Path>) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            path: self.path.join(segment),
        }
    }

    /// Parent directory, if any.
    pub fn parent(&self) -> Option<Self> {
        self.path.parent().map(|p| Self {
            backend: Arc::clone(&self.backend),
            path: p.to_path_buf(),
        })
    }

    /// Path relative to an ancestor on the same backend.
    pub fn relative_to(&self, base: &VfsPath) -> Option<PathBuf> {
        self.path.strip_prefix(&base.path).ok().map(Path::to_path_buf)
    }

    /// Rebind a raw backend path onto this path's backend.
    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            path: path.into(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.backend.is_file(&self.path)
    }

    pub fn is_dir(&self) -> bool {
        self.backend.is_dir(&self.path)
    }

    pub fn is_symlink(&self) -> bool {
        self.backend.is_symlink(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.backend.exists(&self.path)
    }

    pub fn size(&self) -> VfsResult<u64> {
        self.backend.size(&self.path)
    }

    /// Immediate children, bound to this backend.
    pub fn read_dir(&self) -> VfsResult<Vec<VfsPath>> {
        let children = self.backend.read_dir(&self.path)?;
        Ok(children.into_iter().map(|p| self.with_path(p)).collect())
    }

    /// All files underneath, recursively, bound to this backend.
    pub fn rglob(&self) -> VfsResult<Vec<VfsPath>> {
        let files = self.backend.rglob(&self.path)?;
        Ok(files.into_iter().map(|p| self.with_path(p)).collect())
    }

    /// Whole-file copy to a destination, possibly on another backend.
    pub fn copy_to(&self, dest: &VfsPath, overwrite: bool) -> VfsResult<()> {
        if !overwrite && dest.exists() {
            return Err(VfsError::AlreadyExists {
                path: dest.path.clone(),
            });
        }
        if Arc::ptr_eq(&self.backend, &dest.backend) {
            self.backend.native_copy(&self.path, &dest.path)
        } else {
            let data = self.backend.read_bytes(&self.path)?;
            dest.backend.write_bytes(&dest.path, &data)
        }
    }

    /// Rename within the same backend.
    pub fn rename(&self, dest: &VfsPath) -> VfsResult<()> {
        self.backend.rename(&self.path, &dest.path)
    }

    pub fn unlink(&self) -> VfsResult<()> {
        self.backend.unlink(&self.path)
    }

    pub fn rmdir(&self) -> VfsResult<()> {
        self.backend.rmdir(&self.path)
    }

    /// Forced recursive removal.
    pub fn remove_dir_all(&self) -> VfsResult<()> {
        self.backend.remove_dir_all(&self.path)
    }

    pub fn mkdir(&self, parents: bool, exist_ok: bool) -> VfsResult<()> {
        self.backend.mkdir(&self.path, parents, exist_ok)
    }

    /// Read a symbolic link's target.
    pub fn read_link(&self) -> VfsResult<PathBuf> {
        self.backend.read_link(&self.path)
    }

    /// Create a symbolic link at this path pointing at `target`.
    pub fn symlink_to(&self, target: &Path) -> VfsResult<()> {
        self.backend.symlink(target, &self.path)
    }

    pub fn open_read(&self) -> VfsResult<Box<dyn Read + Send>> {
        self.backend.open_read(&self.path)
    }

    pub fn open_write(&self) -> VfsResult<Option<Box<dyn Write + Send>>> {
        self.backend.open_write(&self.path)
    }

    pub fn read_bytes(&self) -> VfsResult<Vec<u8>> {
        self.backend.read_bytes(&self.path)
    }

    pub fn write_bytes(&self, data: &[u8]) -> VfsResult<()> {
        self.backend.write_bytes(&self.path, data)
    }

    /// Copy permissions from this path to `dest` (same backend).
    pub fn copy_metadata_to(&self, dest: &VfsPath) -> VfsResult<()> {
        self.backend.copy_metadata(&self.path, &dest.path)
    }

    /// Batched-removal capability of the owning backend, if any.
    pub fn bulk_delete(&self) -> Option<&dyn BulkDelete> {
        self.backend.bulk_delete()
    }

    /// Whether two paths live on the same scheme.
    pub fn same_scheme(&self, other: &VfsPath) -> bool {
        self.scheme() == other.scheme()
    }
}

impl std::fmt::Debug for VfsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.path.display())
    }
}

impl std::fmt::Display for VfsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl PartialEq for VfsPath {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend) && self.path == other.path
    }
}

impl Eq for VfsPath {}
