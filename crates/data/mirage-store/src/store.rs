//! Directory-backed artifact store

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use mirage_core::Identifier;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{Result, StoreError};

/// Extension of every stored page.
pub const ARTIFACT_EXTENSION: &str = "html";

const TEMP_EXTENSION: &str = "tmp";

// Visible history window as a fraction of the retention cap.
const WINDOW_NUMERATOR: usize = 7;
const WINDOW_DENOMINATOR: usize = 10;

/// Number of entries history listing may ever expose: `ceil(max_files * 0.7)`.
pub fn visible_window(max_files: usize) -> usize {
    max_files
        .saturating_mul(WINDOW_NUMERATOR)
        .saturating_add(WINDOW_DENOMINATOR - 1)
        / WINDOW_DENOMINATOR
}

/// One stored page as seen by a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub identifier: Identifier,
    pub modified_at: SystemTime,
}

impl ArtifactEntry {
    /// Modification time as milliseconds since the Unix epoch.
    pub fn modified_millis(&self) -> u64 {
        self.modified_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// The result store. Cheap to clone; holds no open handles.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
    max_files: usize,
}

impl ResultStore {
    /// Describe a store rooted at `dir`. Performs no I/O.
    pub fn new(dir: impl Into<PathBuf>, max_files: usize) -> Self {
        Self {
            dir: dir.into(),
            max_files,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn visible_window(&self) -> usize {
        visible_window(self.max_files)
    }

    /// Final on-disk location of an artifact.
    pub fn path_for(&self, identifier: &Identifier) -> PathBuf {
        self.dir
            .join(format!("{}.{}", identifier, ARTIFACT_EXTENSION))
    }

    /// Create the directory if missing and sweep temp files left by
    /// interrupted writes. Call once, before any `create`.
    pub async fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let mut reader = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let mut swept = 0usize;
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            if !is_temp_name(&entry.file_name()) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => swept += 1,
                Err(e) => tracing::warn!(
                    path = %entry.path().display(),
                    "Failed to remove stale temp file: {}",
                    e
                ),
            }
        }

        if swept > 0 {
            tracing::info!(swept, dir = %self.dir.display(), "Removed stale temp files");
        }
        Ok(())
    }

    /// Persist a new artifact.
    ///
    /// The content is written to a hidden temp file in the same directory,
    /// synced, and hard-linked into place, so readers see either nothing or
    /// the whole page. Linking fails if the target exists, so of two racing
    /// creates of one identifier exactly one wins.
    pub async fn create(
        &self,
        identifier: &Identifier,
        content: impl AsRef<[u8]>,
    ) -> Result<PathBuf> {
        let target = self.path_for(identifier);

        match fs::try_exists(&target).await {
            Ok(true) => return Err(StoreError::AlreadyExists(identifier.clone())),
            Ok(false) => {}
            Err(e) => return Err(StoreError::io(&target, e)),
        }

        let temp = self.dir.join(format!(
            ".{}.{}.{}.{}",
            identifier,
            ARTIFACT_EXTENSION,
            Uuid::new_v4().simple(),
            TEMP_EXTENSION
        ));

        if let Err(e) = write_synced(&temp, content.as_ref()).await {
            discard(&temp).await;
            return Err(StoreError::io(&temp, e));
        }

        let published = fs::hard_link(&temp, &target).await;
        discard(&temp).await;
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(identifier.clone()));
            }
            Err(e) => return Err(StoreError::io(&target, e)),
        }

        tracing::debug!(identifier = %identifier, path = %target.display(), "Artifact created");
        Ok(target)
    }

    /// Read the directory once and stat every artifact once.
    ///
    /// Entries that vanish between the listing and the stat are skipped, as
    /// is anything that is not an `<identifier>.html` regular file.
    pub async fn snapshot(&self) -> Result<Vec<ArtifactEntry>> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || snapshot_blocking(&dir)).await?
    }

    /// One page of history, newest first, restricted to the visible window.
    ///
    /// Returns an empty vector once `page * page_size` passes the end of the
    /// window; callers use that as the end-of-pagination signal.
    pub async fn list(&self, page: usize, page_size: usize) -> Result<Vec<ArtifactEntry>> {
        if page_size == 0 {
            return Err(StoreError::InvalidPageSize);
        }

        let mut entries = self.snapshot().await?;
        sort_newest_first(&mut entries);
        entries.truncate(self.visible_window());

        let start = match page.checked_mul(page_size) {
            Some(start) if start < entries.len() => start,
            _ => return Ok(Vec::new()),
        };
        let end = start.saturating_add(page_size).min(entries.len());

        Ok(entries.drain(start..end).collect())
    }

    /// Delete the oldest artifacts until at most `max_count` remain.
    ///
    /// Individual delete failures are logged and skipped. Returns the number
    /// of files actually removed.
    pub async fn evict_excess(&self, max_count: usize) -> Result<usize> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || evict_blocking(&dir, max_count)).await?
    }
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "Failed to remove temp file: {}", e);
        }
    }
}

fn snapshot_blocking(dir: &Path) -> Result<Vec<ArtifactEntry>> {
    let reader = std::fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut candidates = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        if let Some(identifier) = artifact_identifier(&entry.file_name()) {
            candidates.push((identifier, entry.path()));
        }
    }

    let mut entries = Vec::with_capacity(candidates.len());
    for (identifier, path) in candidates {
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(identifier = %identifier, "Artifact vanished during snapshot");
                continue;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Skipping unreadable artifact: {}", e);
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        match metadata.modified() {
            Ok(modified_at) => entries.push(ArtifactEntry {
                identifier,
                modified_at,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Skipping artifact without mtime: {}", e);
            }
        }
    }

    Ok(entries)
}

fn evict_blocking(dir: &Path, max_count: usize) -> Result<usize> {
    let mut entries = snapshot_blocking(dir)?;
    if entries.len() <= max_count {
        return Ok(0);
    }

    sort_newest_first(&mut entries);
    let excess = entries.split_off(max_count);

    let mut evicted = 0usize;
    // Oldest first, so an interrupted pass still removed the right files.
    for entry in excess.iter().rev() {
        let path = dir.join(format!("{}.{}", entry.identifier, ARTIFACT_EXTENSION));
        match std::fs::remove_file(&path) {
            Ok(()) => evicted += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(identifier = %entry.identifier, "Artifact already gone");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to evict artifact: {}", e);
            }
        }
    }

    if evicted > 0 {
        tracing::info!(evicted, retained = max_count, "Evicted old artifacts");
    }
    Ok(evicted)
}

fn sort_newest_first(entries: &mut [ArtifactEntry]) {
    entries.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
}

fn artifact_identifier(name: &OsStr) -> Option<Identifier> {
    let name = name.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    let stem = name.strip_suffix(ARTIFACT_EXTENSION)?.strip_suffix('.')?;
    Identifier::parse(stem).ok()
}

fn is_temp_name(name: &OsStr) -> bool {
    name.to_str()
        .map(|n| n.starts_with('.') && n.ends_with(TEMP_EXTENSION))
        .unwrap_or(false)
}
