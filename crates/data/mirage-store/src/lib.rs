//! Mirage Result Store
//!
//! Owns the flat directory of generated pages. Each page is one
//! `<identifier>.html` file; the directory listing plus file metadata is the
//! only index, so there is nothing to keep consistent besides the files.
//!
//! ```text
//!   create ──► .<id>.html.<uuid>.tmp ──link────► <id>.html
//!   list   ──► snapshot ─► newest first ─► visible window (70%) ─► page
//!   evict  ──► snapshot ─► oldest first ─► delete beyond cap
//! ```

pub mod store;

pub use store::{visible_window, ArtifactEntry, ResultStore, ARTIFACT_EXTENSION};

use std::path::PathBuf;

use mirage_core::{CoreError, Identifier};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact already exists: {0}")]
    AlreadyExists(Identifier),

    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    #[error(transparent)]
    InvalidIdentifier(#[from] CoreError),

    #[error("Filesystem task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
