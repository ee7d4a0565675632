//! Shared types for workspace queries and status.

use crate::store::MetadataEntry;
use crate::types::ContentHash;
use serde::{Deserialize, Serialize};

/// Snapshot of the index and the persisted metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceStatus {
    pub root: String,
    pub meta_dir: String,
    pub indexed_files: usize,
    pub objects: usize,
    pub active_entries: usize,
    pub inactive_entries: usize,
    /// Hashes registered in the relation graph.
    pub relation_nodes: usize,
}

/// Entry of one path together with the hash it lives under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryView {
    pub path: String,
    pub hash: ContentHash,
    /// Other paths sharing the hash, active or not.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub siblings: Vec<String>,
    pub entry: MetadataEntry,
}
