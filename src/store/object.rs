//! Metadata objects and entries as persisted per content hash.

use crate::tree::path::{file_extension, file_name};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Toolchain details attached to an entry by the build-info collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildInfo {
    pub toolchain_name: String,
    pub toolchain_version: String,
    /// Raw build configuration the artifact was produced with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_config: Option<String>,
    /// Workspace-relative path of the input this artifact was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Metadata recorded for one path that holds (or held) a given content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataEntry {
    pub name: String,
    #[serde(default, alias = "fileExtension")]
    pub file_extension: String,
    #[serde(default = "epoch", alias = "createTime")]
    pub created_time: DateTime<Utc>,
    #[serde(default = "epoch", alias = "modifiedTime")]
    pub modified_time: DateTime<Utc>,
    #[serde(default, alias = "isDeleted", alias = "is_deleted")]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_info: Option<BuildInfo>,
    /// Fields written by other tools; kept so rewrites don't drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MetadataEntry {
    /// Fresh active entry for `key` with explicit timestamps.
    pub fn new(key: &str, created_time: DateTime<Utc>, modified_time: DateTime<Utc>) -> Self {
        Self {
            name: file_name(key).to_string(),
            file_extension: file_extension(key).unwrap_or_default().to_string(),
            created_time,
            modified_time,
            is_deleted: false,
            build_info: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Fresh active entry for `key` stamped from the file's filesystem times.
    ///
    /// Falls back to the current time when the file can't be stat'ed or the
    /// platform has no birth time.
    pub fn from_file(key: &str, file: &Path) -> Self {
        let now = Utc::now();
        let (created, modified) = match std::fs::metadata(file) {
            Ok(meta) => {
                let modified = meta.modified().map(to_utc).unwrap_or(now);
                let created = meta.created().map(to_utc).unwrap_or(modified);
                (created, modified)
            }
            Err(_) => (now, now),
        };
        Self::new(key, created, modified)
    }

    /// Re-derive the path-dependent fields for a new key.
    pub fn rebind(&mut self, key: &str) {
        self.name = file_name(key).to_string();
        self.file_extension = file_extension(key).unwrap_or_default().to_string();
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// All entries sharing one content hash, keyed by relative path in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataObject(IndexMap<String, MetadataEntry>);

impl MetadataObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty object has never been initialized for its hash.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&MetadataEntry> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut MetadataEntry> {
        self.0.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace; a replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, entry: MetadataEntry) -> Option<MetadataEntry> {
        self.0.insert(key.into(), entry)
    }

    /// Remove preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<MetadataEntry> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataEntry)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut MetadataEntry)> {
        self.0.iter_mut()
    }

    /// Mark `key` deleted. Returns whether anything changed.
    pub fn disable(&mut self, key: &str) -> bool {
        match self.0.get_mut(key) {
            Some(entry) if !entry.is_deleted => {
                entry.is_deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Entry to inherit from when a new path acquires this hash.
    ///
    /// Picks the active entry with the latest modified time (later insertion
    /// wins ties); with no active entry, the last inserted one.
    pub fn seed_entry(&self) -> Option<&MetadataEntry> {
        let mut best: Option<&MetadataEntry> = None;
        for entry in self.0.values().filter(|e| !e.is_deleted) {
            match best {
                Some(current) if current.modified_time > entry.modified_time => {}
                _ => best = Some(entry),
            }
        }
        best.or_else(|| self.0.values().last())
    }

    pub fn active_count(&self) -> usize {
        self.0.values().filter(|e| !e.is_deleted).count()
    }
}
