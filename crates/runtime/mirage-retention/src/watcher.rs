//! Directory change notifications
//!
//! Wraps a `notify` watcher on the result directory and turns every relevant
//! event into a `()` on a tokio channel for the scheduler to debounce.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::Result;

/// Channel capacity. A full channel already guarantees a pending wake-up,
/// so extra events are dropped rather than queued.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Keeps the OS watch alive; dropping it closes the change channel.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl DirectoryWatcher {
    /// Watch `dir` (non-recursively) and return the change receiver.
    pub fn watch(dir: &Path) -> Result<(Self, mpsc::Receiver<()>)> {
        let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);

        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            match event {
                Ok(event) if is_relevant(&event) => {
                    let _ = tx.try_send(());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Directory watch error: {}", e),
            }
        })?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %dir.display(), "Watching result directory");

        Ok((
            Self {
                _watcher: watcher,
                dir: dir.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("dir", &self.dir)
            .finish()
    }
}

/// Reads and deletions never push the directory over its cap; eviction's own
/// deletes would otherwise re-trigger it.
fn is_relevant(event: &Event) -> bool {
    !event.paths.is_empty() && !matches!(event.kind, EventKind::Access(_) | EventKind::Remove(_))
}
