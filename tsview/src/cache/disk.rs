//! Filesystem-backed preview store.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::cache::key::PreviewKey;
use crate::cache::path::{
    parse_preview_path, preview_path, series_directory, temp_path, PREVIEW_EXTENSION,
    TEMP_EXTENSION,
};
use crate::cache::store::BlobStore;
use crate::cache::types::CacheError;

/// Preview store rooted at a directory.
///
/// Files are laid out per series and bin factor (see
/// [`preview_path`](crate::cache::preview_path)). The root may be shared
/// with other data: removals only touch files that parse as previews and
/// prune the directories they leave empty.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open a store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan_blocking(root: &Path) -> Vec<(PreviewKey, u64)> {
        let mut found = Vec::new();
        Self::scan_recursive(root, root, &mut found);
        found
    }

    fn scan_recursive(root: &Path, dir: &Path, found: &mut Vec<(PreviewKey, u64)>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(
                    dir = %dir.display(),
                    error = %e,
                    "Failed to read directory during preview scan"
                );
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                Self::scan_recursive(root, &path, found);
            } else if file_type.is_file() {
                let Some(key) = parse_preview_path(root, &path) else {
                    continue;
                };
                if let Ok(metadata) = entry.metadata() {
                    found.push((key, metadata.len()));
                }
            }
        }
    }

    /// Delete every preview (and leftover temp file) under `dir`, then prune
    /// directories that emptied. Anything else is left in place.
    ///
    /// Keeps going past failures and returns the first one.
    fn remove_previews_blocking(root: &Path, dir: &Path) -> io::Result<usize> {
        let mut removed = 0;
        let mut first_error = None;
        Self::remove_recursive(root, dir, &mut removed, &mut first_error);

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    fn remove_recursive(
        root: &Path,
        dir: &Path,
        removed: &mut usize,
        first_error: &mut Option<io::Error>,
    ) {
        let removed_before = *removed;
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                first_error.get_or_insert(e);
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                Self::remove_recursive(root, &path, removed, first_error);
            } else if file_type.is_file() && Self::is_owned_file(root, &path) {
                match std::fs::remove_file(&path) {
                    Ok(()) => *removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        // Only directories this pass emptied; fails harmlessly when foreign
        // files remain
        if dir != root && *removed > removed_before {
            let _ = std::fs::remove_dir(dir);
        }
    }

    /// A stored preview, or the temp file of one.
    fn is_owned_file(root: &Path, path: &Path) -> bool {
        if parse_preview_path(root, path).is_some() {
            return true;
        }
        path.extension().and_then(|e| e.to_str()) == Some(TEMP_EXTENSION)
            && parse_preview_path(root, &path.with_extension(PREVIEW_EXTENSION)).is_some()
    }

    fn remove_previews(&self, dir: PathBuf) -> BoxFuture<'_, Result<(), CacheError>> {
        let root = self.root.clone();
        Box::pin(async move {
            let removed = tokio::task::spawn_blocking(move || {
                Self::remove_previews_blocking(&root, &dir)
            })
            .await
            .map_err(|e| CacheError::Task(e.to_string()))??;

            debug!(removed, "Removed stored previews");
            Ok(())
        })
    }
}

impl BlobStore for DiskStore {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<(PreviewKey, u64)>, CacheError>> {
        let root = self.root.clone();
        Box::pin(async move {
            let found = tokio::task::spawn_blocking(move || Self::scan_blocking(&root))
                .await
                .map_err(|e| CacheError::Task(e.to_string()))?;

            info!(
                entries = found.len(),
                bytes = found.iter().map(|(_, size)| size).sum::<u64>(),
                "Preview store scanned"
            );
            Ok(found)
        })
    }

    fn read(&self, key: &PreviewKey) -> BoxFuture<'_, Result<Option<Bytes>, CacheError>> {
        let path = preview_path(&self.root, key);
        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(Bytes::from(data))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(CacheError::Io(e)),
            }
        })
    }

    fn write(&self, key: &PreviewKey, data: Bytes) -> BoxFuture<'_, Result<(), CacheError>> {
        let path = preview_path(&self.root, key);
        Box::pin(async move {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            // Write atomically via temp file
            let temp = temp_path(&path);
            if let Err(e) = tokio::fs::write(&temp, &data).await {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(CacheError::Io(e));
            }
            if let Err(e) = tokio::fs::rename(&temp, &path).await {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(CacheError::Io(e));
            }
            Ok(())
        })
    }

    fn remove(&self, key: &PreviewKey) -> BoxFuture<'_, Result<bool, CacheError>> {
        let path = preview_path(&self.root, key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(CacheError::Io(e)),
            }
        })
    }

    fn remove_series(&self, series_id: &str) -> BoxFuture<'_, Result<(), CacheError>> {
        self.remove_previews(series_directory(&self.root, series_id))
    }

    fn remove_all(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        self.remove_previews(self.root.clone())
    }
}
