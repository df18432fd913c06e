//! Storage scheme identifiers.

use serde::{Deserialize, Serialize};

/// Which storage backend a path belongs to.
///
/// Same-scheme operations can use cheap primitives (rename); cross-scheme
/// operations must go through copy-then-delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// Local disk.
    Local,
    /// Remote object store.
    Remote,
    /// Read-only archive-backed paths.
    Archive,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Archive => write!(f, "archive"),
        }
    }
}
