//! Path normalization and tracked-extension filtering.
//!
//! Index keys and metadata entry keys are workspace-relative and
//! `/`-separated. They keep the on-disk spelling of every segment, since the
//! key is joined back onto the root to read the file. Lookups that come from a
//! user instead of the filesystem compare segments after NFC normalization.

use crate::error::ApiError;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Extensions eligible for metadata tracking when nothing else is configured.
pub const DEFAULT_TRACKED_EXTENSIONS: [&str; 6] =
    [".pb", ".onnx", ".tflite", ".circle", ".cfg", ".log"];

/// Canonicalize a path without the `\\?\` prefix on Windows.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, ApiError> {
    dunce::canonicalize(path).map_err(|e| {
        ApiError::ConfigError(format!(
            "Failed to canonicalize workspace path {}: {}",
            path.display(),
            e
        ))
    })
}

/// Convert an absolute path under `root` to an index key.
///
/// Returns `None` for paths outside the root, the root itself, or paths
/// containing `..` after the root prefix.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Whether two key segments name the same file once both are NFC-normalized.
pub fn same_segment(a: &str, b: &str) -> bool {
    a == b || a.nfc().eq(b.nfc())
}

/// Split an index key into its segments.
pub fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('/').filter(|s| !s.is_empty())
}

/// Parent key of `key`; `""` for top-level entries.
pub fn parent_key(key: &str) -> &str {
    key.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Final segment of `key`.
pub fn file_name(key: &str) -> &str {
    key.rsplit_once('/').map(|(_, name)| name).unwrap_or(key)
}

/// Extension of the final segment without the dot.
pub fn file_extension(key: &str) -> Option<&str> {
    Path::new(file_name(key)).extension().and_then(|e| e.to_str())
}

/// Re-root `key` from `from` to `to`; `None` if `key` is not under `from`.
pub fn rebase_key(key: &str, from: &str, to: &str) -> Option<String> {
    if key == from {
        return Some(to.to_string());
    }
    let suffix = key.strip_prefix(from)?.strip_prefix('/')?;
    Some(format!("{}/{}", to, suffix))
}

/// Allow-list of file extensions participating in indexing and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedExtensions {
    extensions: Vec<String>,
}

impl TrackedExtensions {
    /// Build from configured suffixes; a leading dot is optional.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        match file_extension(key) {
            Some(ext) => self.extensions.iter().any(|e| e == ext),
            None => false,
        }
    }

    pub fn is_tracked_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for TrackedExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKED_EXTENSIONS)
    }
}
