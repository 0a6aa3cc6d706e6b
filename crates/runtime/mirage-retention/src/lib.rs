//! Mirage Retention
//!
//! Keeps the result directory under its cap. Two independent triggers feed
//! one effect, [`RetentionTarget::evict_excess`]:
//!
//! ```text
//!   interval tick ─────────────────────────────┐
//!                                              ├──► evict_excess(max_files)
//!   dir change ─► Pending(deadline) ─ quiet ───┘
//!                     ▲        │
//!                     └─ change┘ (deadline replaced, never stacked)
//! ```

pub mod scheduler;
pub mod watcher;

pub use scheduler::{RetentionConfig, RetentionHandle, RetentionScheduler, RetentionStats, Trigger};
pub use watcher::DirectoryWatcher;

use async_trait::async_trait;
use mirage_store::{ResultStore, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("Failed to watch directory: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, RetentionError>;

/// Anything the scheduler can trim down to a maximum count.
#[async_trait]
pub trait RetentionTarget: Send + Sync {
    /// Remove the oldest entries beyond `max_count`, returning how many went.
    async fn evict_excess(&self, max_count: usize) -> std::result::Result<usize, StoreError>;
}

#[async_trait]
impl RetentionTarget for ResultStore {
    async fn evict_excess(&self, max_count: usize) -> std::result::Result<usize, StoreError> {
        ResultStore::evict_excess(self, max_count).await
    }
}
