//! Error types for storage operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::Scheme;

/// Result alias for storage operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Destination already exists and overwrite was not requested.
    #[error("Already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// The backend does not support mutation.
    #[error("{scheme} storage is read-only: {path}")]
    ReadOnly { scheme: Scheme, path: PathBuf },

    /// Expected a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The backend cannot perform this operation.
    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VfsError {
    /// Create an I/O error with path context, classifying the kind.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a read-only error for a backend.
    pub fn read_only(scheme: Scheme, path: impl Into<PathBuf>) -> Self {
        Self::ReadOnly {
            scheme,
            path: path.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Whether this error means the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
