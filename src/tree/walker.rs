//! Initial workspace scan that builds the path index

use super::hasher::ContentHasher;
use super::index::PathIndex;
use super::path::{relative_key, TrackedExtensions};
use crate::error::StorageError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Recursive scanner over the workspace tree.
///
/// Skips the metadata directory and symlinks; only tracked files are hashed.
#[derive(Debug, Clone)]
pub struct WorkspaceScanner {
    root: PathBuf,
    meta_dir: PathBuf,
    tracked: TrackedExtensions,
    hasher: ContentHasher,
}

impl WorkspaceScanner {
    pub fn new(
        root: impl Into<PathBuf>,
        meta_dir: impl Into<PathBuf>,
        tracked: TrackedExtensions,
        hasher: ContentHasher,
    ) -> Self {
        Self {
            root: root.into(),
            meta_dir: meta_dir.into(),
            tracked,
            hasher,
        }
    }

    /// Walk the workspace and build a fresh index.
    pub fn scan(&self) -> Result<PathIndex, StorageError> {
        let mut index = PathIndex::new(self.root.clone(), self.hasher);
        for key in self.tracked_files(&self.root)? {
            let abs = self.root.join(&key);
            match self.hasher.hash_file(&abs) {
                Ok(hash) => {
                    index.insert(&key, hash);
                }
                Err(e) if e.is_not_found() => {
                    debug!(path = %key, "File vanished during scan");
                }
                Err(e) => return Err(e),
            }
        }
        debug!(files = index.len(), "Workspace scan complete");
        Ok(index)
    }

    /// Tracked file keys at or below `dir`, sorted by path.
    pub fn tracked_files(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let meta_abs = self.root.join(&self.meta_dir);
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.path() != meta_abs);

        let mut keys = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    if e.depth() == 0 {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                        let source = e
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("walk error"));
                        return Err(StorageError::io(path, source));
                    }
                    warn!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.tracked.is_tracked_path(entry.path()) {
                continue;
            }
            if let Some(key) = relative_key(&self.root, entry.path()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
