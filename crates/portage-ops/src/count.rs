//! Recursive pre-count of work items.

use portage_vfs::{Scheme, VfsPath, VfsResult};

/// Count the individual files implied by a set of source roots.
///
/// Files and symbolic links count as 1 each. Directories are walked
/// recursively; a symbolic link to a directory counts as 1 and is not
/// descended into (it is an atomic unit of work). A directory that cannot
/// be enumerated counts as 1 instead of failing the count. Archive roots
/// enumerate via the backend's recursive listing.
///
/// The count is recomputed from scratch on every call; selections are
/// small relative to total system size and correctness under concurrent
/// directory mutation matters more than counting speed.
pub fn count_files_recursively(paths: &[VfsPath]) -> usize {
    let mut total = 0;
    for path in paths {
        if path.is_file() || path.is_symlink() {
            total += 1;
        } else if path.is_dir() {
            total += count_dir(path).unwrap_or(1);
        }
    }
    total
}

fn count_dir(dir: &VfsPath) -> VfsResult<usize> {
    if dir.scheme() == Scheme::Archive {
        return Ok(dir.rglob()?.len());
    }

    let mut total = 0;
    let mut stack = vec![dir.clone()];
    while let Some(current) = stack.pop() {
        for child in current.read_dir()? {
            if child.is_symlink() {
                total += 1;
            } else if child.is_dir() {
                stack.push(child);
            } else if child.is_file() {
                total += 1;
            }
        }
    }
    Ok(total)
}
