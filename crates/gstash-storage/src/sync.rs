//! Local directory traversal for folder uploads.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Every regular file under `root`, depth-first.
///
/// Entries are visited in name order within each directory, and a directory's
/// files and subdirectories are interleaved in that order. Symlinks are
/// followed. A directory whose canonical path is already on the current
/// descent path is a cycle and is skipped; aliases elsewhere in the tree are
/// still listed under each of their names.
pub async fn list_files(root: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let ancestors = Arc::new(vec![tokio::fs::canonicalize(root).await?]);

    let mut stack: Vec<(PathBuf, Arc<Vec<PathBuf>>)> = sorted_children(root)
        .await?
        .into_iter()
        .rev()
        .map(|child| (child, Arc::clone(&ancestors)))
        .collect();

    while let Some((path, ancestors)) = stack.pop() {
        let meta = tokio::fs::metadata(&path).await?;

        if meta.is_dir() {
            let canonical = tokio::fs::canonicalize(&path).await?;
            if ancestors.contains(&canonical) {
                debug!(path = %path.display(), "Skipping directory cycle");
                continue;
            }
            let mut chain = ancestors.as_ref().clone();
            chain.push(canonical);
            let chain = Arc::new(chain);

            let children = sorted_children(&path).await?;
            stack.extend(
                children
                    .into_iter()
                    .rev()
                    .map(|child| (child, Arc::clone(&chain))),
            );
        } else if meta.is_file() {
            files.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-regular file");
        }
    }

    Ok(files)
}

async fn sorted_children(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut children = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

/// Path of `path` relative to `root`, as a `/`-separated key fragment.
///
/// Works on path components, so `/data-old/x` is not considered to be under
/// `/data`.
pub fn relative_key(root: &Path, path: &Path) -> StorageResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        StorageError::InvalidKey(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        ))
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| {
                    StorageError::InvalidKey(format!("non UTF-8 path: {}", path.display()))
                })?;
                segments.push(segment);
            }
            Component::CurDir => {}
            _ => {
                return Err(StorageError::InvalidKey(format!(
                    "unexpected path component in {}",
                    path.display()
                )))
            }
        }
    }

    if segments.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "{} is the root itself",
            path.display()
        )));
    }

    Ok(segments.join("/"))
}
