//! Scratch files for uploading in-memory payloads.
//!
//! Object uploads take a local path, so byte payloads are first written to a
//! scratch file inside a [`StagingArea`]. Each scratch file is owned by a
//! [`StagedFile`] guard and is removed when the guard is released, whether the
//! upload succeeded or not.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StorageResult;

/// Scratch directory shared by every staged upload of one client.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Create the directory if needed and remove anything left inside it.
    pub async fn prepare(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut removed = 0usize;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
            removed += 1;
        }

        debug!(dir = %dir.display(), removed, "Prepared staging area");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` to a new, randomly named scratch file.
    pub async fn stage(&self, data: &[u8]) -> StorageResult<StagedFile> {
        // 16 random bytes, hex encoded.
        let name = Uuid::new_v4().simple().to_string();
        let path = self.dir.join(name);

        // Created before the write so a failed write still cleans up.
        let guard = StagedFile {
            path,
            removed: false,
        };

        let mut file = tokio::fs::File::create(&guard.path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        debug!(path = %guard.path.display(), bytes = data.len(), "Staged payload");
        Ok(guard)
    }
}

/// A scratch file that is deleted when released or dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    removed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the scratch file now.
    pub async fn remove(mut self) -> StorageResult<()> {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "Failed to remove staged file: {}", e);
            }
        }
    }
}
