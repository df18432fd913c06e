//! In-memory object store, standing in for a remote backend.
//!
//! Flat key namespace with directory semantics synthesized from key
//! prefixes, the way object stores behave. No symlinks, no streaming
//! upload, and a batched bulk-delete capability.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Backend, BulkDelete, Scheme, VfsError, VfsPath, VfsResult};

/// Maximum number of keys per bulk-delete request.
pub const BULK_DELETE_BATCH: usize = 1000;

/// In-memory remote-scheme backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Root path of this store.
    pub fn root(self: &Arc<Self>) -> VfsPath {
        VfsPath::new(Arc::clone(self) as Arc<dyn Backend>, "/")
    }

    /// Number of objects currently stored.
    pub fn object_count(&self) -> usize {
        self.store().len()
    }

    fn store(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn keys_under(&self, prefix: &Path) -> Vec<PathBuf> {
        self.store()
            .keys()
            .filter(|k| k.starts_with(prefix) && k.as_path() != prefix)
            .cloned()
            .collect()
    }
}

impl Backend for MemoryBackend {
    fn scheme(&self) -> Scheme {
        Scheme::Remote
    }

    fn is_file(&self, path: &Path) -> bool {
        self.store().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        if path == Path::new("/") {
            return true;
        }
        !self.is_file(path) && !self.keys_under(path).is_empty()
    }

    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn size(&self, path: &Path) -> VfsResult<u64> {
        self.store()
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(|| VfsError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        let mut children = Vec::new();
        for key in self.keys_under(path) {
            if let Ok(rest) = key.strip_prefix(path) {
                if let Some(first) = rest.components().next() {
                    let child = path.join(first);
                    if !children.contains(&child) {
                        children.push(child);
                    }
                }
            }
        }
        Ok(children)
    }

    fn rglob(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        Ok(self.keys_under(path))
    }

    fn native_copy(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let mut store = self.store();
        let data = store.get(from).cloned().ok_or_else(|| VfsError::NotFound {
            path: from.to_path_buf(),
        })?;
        store.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let mut store = self.store();
        if let Some(data) = store.remove(from) {
            store.insert(to.to_path_buf(), data);
            return Ok(());
        }
        // Directory rename: remap every key under the prefix.
        let moved: Vec<PathBuf> = store
            .keys()
            .filter(|k| k.starts_with(from) && k.as_path() != from)
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(VfsError::NotFound {
                path: from.to_path_buf(),
            });
        }
        for key in moved {
            if let (Some(data), Ok(rest)) = (store.remove(&key), key.strip_prefix(from)) {
                store.insert(to.join(rest), data);
            }
        }
        Ok(())
    }

    fn unlink(&self, path: &Path) -> VfsResult<()> {
        self.store()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| VfsError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn rmdir(&self, _path: &Path) -> VfsResult<()> {
        // Directories are implicit; nothing to remove once empty.
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> VfsResult<()> {
        let keys = self.keys_under(path);
        let mut store = self.store();
        for key in keys {
            store.remove(&key);
        }
        Ok(())
    }

    fn mkdir(&self, _path: &Path, _parents: bool, _exist_ok: bool) -> VfsResult<()> {
        // Directories are implicit in the key namespace.
        Ok(())
    }

    fn read_link(&self, path: &Path) -> VfsResult<PathBuf> {
        Err(VfsError::unsupported(format!(
            "remote storage has no symbolic links: {}",
            path.display()
        )))
    }

    fn symlink(&self, _target: &Path, link: &Path) -> VfsResult<()> {
        Err(VfsError::unsupported(format!(
            "remote storage has no symbolic links: {}",
            link.display()
        )))
    }

    fn open_read(&self, path: &Path) -> VfsResult<Box<dyn Read + Send>> {
        let data = self.read_bytes(path)?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn open_write(&self, _path: &Path) -> VfsResult<Option<Box<dyn Write + Send>>> {
        // No streaming upload; callers fall back to write_bytes.
        Ok(None)
    }

    fn read_bytes(&self, path: &Path) -> VfsResult<Vec<u8>> {
        self.store()
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        self.store().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn bulk_delete(&self) -> Option<&dyn BulkDelete> {
        Some(self)
    }
}

impl BulkDelete for MemoryBackend {
    fn list_keys(&self, prefix: &Path) -> VfsResult<Vec<PathBuf>> {
        Ok(self.keys_under(prefix))
    }

    fn delete_batch(&self, keys: &[PathBuf]) -> VfsResult<()> {
        let mut store = self.store();
        for key in keys {
            store.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_roundtrip() {
        let backend = MemoryBackend::new();
        let root = backend.root();
        let obj = root.join("bucket/data.bin");

        obj.write_bytes(b"abc").unwrap();
        assert!(obj.is_file());
        assert_eq!(obj.size().unwrap(), 3);

        let dir = root.join("bucket");
        assert!(dir.is_dir());
        assert!(!dir.is_file());

        obj.unlink().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_read_dir_synthesizes_directories() {
        let backend = MemoryBackend::new();
        let root = backend.root();
        root.join("a/x.txt").write_bytes(b"1").unwrap();
        root.join("a/sub/y.txt").write_bytes(b"2").unwrap();

        let children = root.join("a").read_dir().unwrap();
        assert_eq!(children.len(), 2);

        let files = root.join("a").rglob().unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_directory_rename_remaps_keys() {
        let backend = MemoryBackend::new();
        let root = backend.root();
        root.join("src/a.txt").write_bytes(b"1").unwrap();
        root.join("src/deep/b.txt").write_bytes(b"2").unwrap();

        root.join("src").rename(&root.join("dst")).unwrap();
        assert!(root.join("dst/a.txt").is_file());
        assert!(root.join("dst/deep/b.txt").is_file());
        assert!(!root.join("src").exists());
    }

    #[test]
    fn test_bulk_delete_capability() {
        let backend = MemoryBackend::new();
        let root = backend.root();
        for i in 0..5 {
            root.join(format!("pfx/{i}.dat")).write_bytes(b"x").unwrap();
        }

        let bulk = root.bulk_delete().expect("capability advertised");
        let keys = bulk.list_keys(Path::new("/pfx")).unwrap();
        assert_eq!(keys.len(), 5);
        bulk.delete_batch(&keys).unwrap();
        assert_eq!(backend.object_count(), 0);
    }
}
