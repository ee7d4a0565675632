//! Error types for storage and API layers.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the on-disk stores (metadata objects, relation graph).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata object {path}: {source}")]
    MalformedObject {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed relation file {path}: {source}")]
    MalformedRelations {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Errors surfaced by workspace-level operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("watch error: {0}")]
    WatchError(String),

    #[error("path is outside the workspace: {0}")]
    PathOutsideWorkspace(PathBuf),

    #[error("path is not indexed: {0}")]
    PathNotIndexed(String),

    #[error("operation queue is closed")]
    QueueClosed,
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
