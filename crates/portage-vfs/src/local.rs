//! Local-disk backend over `std::fs`.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Backend, Scheme, VfsError, VfsPath, VfsResult};

/// Backend for local filesystem paths.
#[derive(Debug, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl VfsPath {
    /// Convenience constructor for a local-disk path.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::new(LocalBackend::new(), path)
    }
}

impl Backend for LocalBackend {
    fn scheme(&self) -> Scheme {
        Scheme::Local
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn size(&self, path: &Path) -> VfsResult<u64> {
        fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| VfsError::io(path, e))
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<PathBuf>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| VfsError::io(path, e))? {
            let entry = entry.map_err(|e| VfsError::io(path, e))?;
            children.push(entry.path());
        }
        Ok(children)
    }

    fn native_copy(&self, from: &Path, to: &Path) -> VfsResult<()> {
        fs::copy(from, to).map_err(|e| VfsError::io(from, e))?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        fs::rename(from, to).map_err(|e| VfsError::io(from, e))
    }

    fn unlink(&self, path: &Path) -> VfsResult<()> {
        fs::remove_file(path).map_err(|e| VfsError::io(path, e))
    }

    fn rmdir(&self, path: &Path) -> VfsResult<()> {
        fs::remove_dir(path).map_err(|e| VfsError::io(path, e))
    }

    fn remove_dir_all(&self, path: &Path) -> VfsResult<()> {
        fs::remove_dir_all(path).map_err(|e| VfsError::io(path, e))
    }

    fn mkdir(&self, path: &Path, parents: bool, exist_ok: bool) -> VfsResult<()> {
        let result = if parents {
            fs::create_dir_all(path)
        } else {
            fs::create_dir(path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if exist_ok && e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => {
                Ok(())
            }
            Err(e) => Err(VfsError::io(path, e)),
        }
    }

    fn read_link(&self, path: &Path) -> VfsResult<PathBuf> {
        fs::read_link(path).map_err(|e| VfsError::io(path, e))
    }

    #[cfg(unix)]
    fn symlink(&self, target: &Path, link: &Path) -> VfsResult<()> {
        std::os::unix::fs::symlink(target, link).map_err(|e| VfsError::io(link, e))
    }

    #[cfg(not(unix))]
    fn symlink(&self, _target: &Path, link: &Path) -> VfsResult<()> {
        Err(VfsError::unsupported(format!(
            "symlink creation not supported on this platform: {}",
            link.display()
        )))
    }

    fn open_read(&self, path: &Path) -> VfsResult<Box<dyn Read + Send>> {
        let file = fs::File::open(path).map_err(|e| VfsError::io(path, e))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, path: &Path) -> VfsResult<Option<Box<dyn Write + Send>>> {
        let file = fs::File::create(path).map_err(|e| VfsError::io(path, e))?;
        Ok(Some(Box::new(file)))
    }

    fn read_bytes(&self, path: &Path) -> VfsResult<Vec<u8>> {
        fs::read(path).map_err(|e| VfsError::io(path, e))
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        fs::write(path, data).map_err(|e| VfsError::io(path, e))
    }

    fn copy_metadata(&self, from: &Path, to: &Path) -> VfsResult<()> {
        // Permissions only; timestamps would need an extra crate.
        let perms = fs::metadata(from)
            .map_err(|e| VfsError::io(from, e))?
            .permissions();
        fs::set_permissions(to, perms).map_err(|e| VfsError::io(to, e))
    }
}
