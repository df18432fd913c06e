//! Read-only zip-archive backend.
//!
//! Archive paths act as copy sources only; every mutation returns
//! `VfsError::ReadOnly`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use zip::ZipArchive;

use crate::{Backend, Scheme, VfsError, VfsPath, VfsResult};

/// Backend serving the contents of a zip archive.
pub struct ZipBackend {
    archive: Mutex<ZipArchive<File>>,
    /// File entries, rooted at "/", with their uncompressed sizes.
    files: BTreeMap<PathBuf, u64>,
    /// Explicit and implicit directories, rooted at "/".
    dirs: BTreeSet<PathBuf>,
}

impl ZipBackend {
    /// Open an archive and index its entries.
    pub fn open(path: impl AsRef<Path>) -> VfsResult<Arc<Self>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| VfsError::io(path, e))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| VfsError::unsupported(format!("cannot read archive {}: {e}", path.display())))?;

        let mut files = BTreeMap::new();
        let mut dirs = BTreeSet::new();
        dirs.insert(PathBuf::from("/"));

        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| VfsError::unsupported(format!("bad archive entry: {e}")))?;
            let entry_path = Path::new("/").join(entry.name().trim_end_matches('/'));
            if entry.is_dir() {
                dirs.insert(entry_path.clone());
            } else {
                files.insert(entry_path.clone(), entry.size());
            }
            // Intermediate directories may have no entry of their own.
            let mut parent = entry_path.parent();
            while let Some(dir) = parent {
                dirs.insert(dir.to_path_buf());
                parent = dir.parent();
            }
        }

        debug!(
            "indexed {}: {} files, {} directories",
            path.display(),
            files.len(),
            dirs.len()
        );
        Ok(Arc::new(Self {
            archive: Mutex::new(archive),
            files,
            dirs,
        }))
    }

    /// Root path of the archive.
    pub fn root(self: &Arc<Self>) -> VfsPath {
        VfsPath::new(Arc::clone(self) as Arc<dyn Backend>, "/")
    }

    fn lock(&self) -> MutexGuard<'_, ZipArchive<File>> {
        match self.archive.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn entry_name(path: &Path) -> String {
        path.strip_prefix("/")
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn read_only(&self, path: &Path) -> VfsError {
        VfsError::read_only(Scheme::Archive, path)
    }
}

impl std::fmt::Debug for ZipBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipBackend")
            .field("files", &self.files.len())
            .field("dirs", &self.dirs.len())
            .finish()
    }
}

impl Backend for ZipBackend {
    fn scheme(&self) -> Scheme {
        Scheme::Archive
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn size(&self, path: &Path) -> VfsResult<u64> {
        self.files.get(path).copied().ok_or_else(|| VfsError::NotFound {
            path: path.to_path_buf(),
        })
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        if !self.is_dir(path) {
            return Err(VfsError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        let mut children = BTreeSet::new();
        for candidate in self.files.keys().chain(self.dirs.iter()) {
            if let Ok(rest) = candidate.strip_prefix(path) {
                if let Some(first) = rest.components().next() {
                    children.insert(path.join(first));
                }
            }
        }
        Ok(children.into_iter().collect())
    }

    fn rglob(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        Ok(self
            .files
            .keys()
            .filter(|k| k.starts_with(path) && k.as_path() != path)
            .cloned()
            .collect())
    }

    fn native_copy(&self, _from: &Path, to: &Path) -> VfsResult<()> {
        Err(self.read_only(to))
    }

    fn rename(&self, from: &Path, _to: &Path) -> VfsResult<()> {
        Err(self.read_only(from))
    }

    fn unlink(&self, path: &Path) -> VfsResult<()> {
        Err(self.read_only(path))
    }

    fn rmdir(&self, path: &Path) -> VfsResult<()> {
        Err(self.read_only(path))
    }

    fn remove_dir_all(&self, path: &Path) -> VfsResult<()> {
        Err(self.read_only(path))
    }

    fn mkdir(&self, path: &Path, _parents: bool, _exist_ok: bool) -> VfsResult<()> {
        Err(self.read_only(path))
    }

    fn read_link(&self, path: &Path) -> VfsResult<PathBuf> {
        Err(VfsError::unsupported(format!(
            "archive entries have no symbolic links: {}",
            path.display()
        )))
    }

    fn symlink(&self, _target: &Path, link: &Path) -> VfsResult<()> {
        Err(self.read_only(link))
    }

    fn open_read(&self, path: &Path) -> VfsResult<Box<dyn Read + Send>> {
        // ZipFile borrows the archive, so the entry is drained under the
        // lock and handed out as an owned cursor.
        let data = self.read_bytes(path)?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn open_write(&self, path: &Path) -> VfsResult<Option<Box<dyn Write + Send>>> {
        Err(self.read_only(path))
    }

    fn read_bytes(&self, path: &Path) -> VfsResult<Vec<u8>> {
        if !self.files.contains_key(path) {
            return Err(VfsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let name = Self::entry_name(path);
        let mut archive = self.lock();
        let mut entry = archive
            .by_name(&name)
            .map_err(|e| VfsError::unsupported(format!("archive entry {name}: {e}")))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| VfsError::io(path, e))?;
        Ok(data)
    }

    fn write_bytes(&self, path: &Path, _data: &[u8]) -> VfsResult<()> {
        Err(self.read_only(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use zip::write::SimpleFileOptions;

    fn fixture_zip(dir: &Path) -> PathBuf {
        let zip_path = dir.join("fixture.zip");
        let file = File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let opts = SimpleFileOptions::default();
        writer.start_file("top.txt", opts).unwrap();
        writer.write_all(b"top").unwrap();
        writer.start_file("nested/inner.txt", opts).unwrap();
        writer.write_all(b"inner").unwrap();
        writer.finish().unwrap();
        zip_path
    }

    #[test]
    fn test_archive_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ZipBackend::open(fixture_zip(dir.path())).unwrap();
        let root = backend.root();

        assert!(root.is_dir());
        assert!(root.join("top.txt").is_file());
        assert!(root.join("nested").is_dir());
        assert_eq!(root.rglob().unwrap().len(), 2);
        assert_eq!(root.join("nested/inner.txt").size().unwrap(), 5);
        assert_eq!(root.join("top.txt").read_bytes().unwrap(), b"top");
    }

    #[test]
    fn test_archive_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ZipBackend::open(fixture_zip(dir.path())).unwrap();
        let root = backend.root();

        let entry = root.join("top.txt");
        assert!(matches!(entry.unlink(), Err(VfsError::ReadOnly { .. })));
        assert!(matches!(
            entry.write_bytes(b"nope"),
            Err(VfsError::ReadOnly { .. })
        ));
        assert!(matches!(
            root.join("new").mkdir(true, true),
            Err(VfsError::ReadOnly { .. })
        ));
    }
}
