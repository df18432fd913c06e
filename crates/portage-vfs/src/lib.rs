//! Storage path abstraction for portage.
//!
//! This crate provides the `VfsPath` handle the operation engine works
//! against, plus the three backends it is tested with: local disk, an
//! in-memory object store (remote stand-in), and read-only zip archives.

mod archive;
mod error;
mod local;
mod memory;
mod path;
mod scheme;

pub use archive::ZipBackend;
pub use error::{VfsError, VfsResult};
pub use local::LocalBackend;
pub use memory::{MemoryBackend, BULK_DELETE_BATCH};
pub use path::{Backend, BulkDelete, VfsPath};
pub use scheme::Scheme;
