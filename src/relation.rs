//! Relation Store
//!
//! Derivation forest between content hashes (e.g. a compiled model and the
//! source it was converted from), persisted at `<meta>/relation.json`:
//!
//! ```json
//! { "<hash>": { "parent": "<hash>" | null, "children": ["<hash>", ...] } }
//! ```

use crate::error::StorageError;
use crate::store::persistence::write_pretty_json;
use crate::store::{MetadataObject, MetadataStore};
use crate::types::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RELATION_FILE: &str = "relation.json";

/// Adjacency record for one hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    #[serde(default)]
    pub parent: Option<ContentHash>,
    #[serde(default)]
    pub children: Vec<ContentHash>,
}

/// The whole relation forest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationGraph(BTreeMap<ContentHash, RelationRecord>);

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &ContentHash) -> Option<&RelationRecord> {
        self.0.get(hash)
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.0.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parent(&self, hash: &ContentHash) -> Option<&ContentHash> {
        self.0.get(hash).and_then(|r| r.parent.as_ref())
    }

    pub fn children(&self, hash: &ContentHash) -> &[ContentHash] {
        self.0.get(hash).map(|r| r.children.as_slice()).unwrap_or(&[])
    }

    /// Register `hash` as a node. Returns true if it was new.
    pub fn ensure(&mut self, hash: &ContentHash) -> bool {
        if self.0.contains_key(hash) {
            return false;
        }
        self.0.insert(hash.clone(), RelationRecord::default());
        true
    }

    /// Make `parent` the only parent of `child`. Returns true on change.
    pub fn link(&mut self, child: &ContentHash, parent: &ContentHash) -> bool {
        if child == parent || self.parent(child) == Some(parent) {
            return false;
        }
        self.unlink(child);
        self.ensure(child);
        self.ensure(parent);
        if let Some(record) = self.0.get_mut(child) {
            record.parent = Some(parent.clone());
        }
        if let Some(record) = self.0.get_mut(parent) {
            if !record.children.contains(child) {
                record.children.push(child.clone());
            }
        }
        true
    }

    /// Detach `child` from its parent. Returns true on change.
    pub fn unlink(&mut self, child: &ContentHash) -> bool {
        let Some(old_parent) = self.0.get_mut(child).and_then(|r| r.parent.take()) else {
            return false;
        };
        if let Some(record) = self.0.get_mut(&old_parent) {
            record.children.retain(|c| c != child);
        }
        true
    }

    /// Ancestors of `hash`, nearest first. Stops at the first repeated node.
    pub fn ancestors(&self, hash: &ContentHash) -> Vec<ContentHash> {
        let mut seen: HashSet<&ContentHash> = HashSet::from([hash]);
        let mut out = Vec::new();
        let mut current = self.parent(hash);
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            out.push(parent.clone());
            current = self.parent(parent);
        }
        out
    }

    /// Descendants of `hash` in breadth-first order, each visited once.
    pub fn descendants(&self, hash: &ContentHash) -> Vec<ContentHash> {
        let mut seen: HashSet<&ContentHash> = HashSet::from([hash]);
        let mut queue: VecDeque<&ContentHash> = self.children(hash).iter().collect();
        let mut out = Vec::new();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next.clone());
            queue.extend(self.children(next));
        }
        out
    }
}

/// File-backed access to the relation graph.
#[derive(Debug, Clone)]
pub struct RelationStore {
    path: PathBuf,
}

impl RelationStore {
    pub fn open(meta_dir: impl AsRef<Path>) -> Self {
        Self {
            path: meta_dir.as_ref().join(RELATION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the graph; a missing file is an empty graph.
    pub fn load(&self) -> Result<RelationGraph, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RelationGraph::new()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };
        serde_json::from_str(&content).map_err(|source| StorageError::MalformedRelations {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, graph: &RelationGraph) -> Result<(), StorageError> {
        write_pretty_json(&self.path, graph)?;
        debug!(nodes = graph.len(), "Wrote relation graph");
        Ok(())
    }

    /// Load, apply `f`, and save only when `f` reports a change.
    pub fn update<F>(&self, f: F) -> Result<bool, StorageError>
    where
        F: FnOnce(&mut RelationGraph) -> bool,
    {
        let mut graph = self.load()?;
        let changed = f(&mut graph);
        if changed {
            self.save(&graph)?;
        }
        Ok(changed)
    }

    pub fn ensure(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        self.update(|g| g.ensure(hash))
    }

    pub fn link(&self, child: &ContentHash, parent: &ContentHash) -> Result<bool, StorageError> {
        self.update(|g| g.link(child, parent))
    }

    pub fn unlink(&self, child: &ContentHash) -> Result<bool, StorageError> {
        self.update(|g| g.unlink(child))
    }
}

/// One path entry of a relation node, as shown to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationData {
    pub path: String,
    pub name: String,
    pub toolchain_name: Option<String>,
    pub toolchain_version: Option<String>,
    pub is_deleted: bool,
}

/// A node of the relation view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationNode {
    pub id: ContentHash,
    pub parent: Option<ContentHash>,
    /// Index into `data_list` of the entry that represents the node.
    pub represent_idx: usize,
    pub data_list: Vec<RelationData>,
}

/// Relation view rooted at one hash: the node itself, its ancestors nearest
/// first, then its descendants breadth-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInfo {
    pub selected: ContentHash,
    pub relation_data: Vec<RelationNode>,
}

impl RelationInfo {
    pub fn collect(
        graph: &RelationGraph,
        store: &dyn MetadataStore,
        selected: &ContentHash,
    ) -> Result<Self, StorageError> {
        let order = std::iter::once(selected.clone())
            .chain(graph.ancestors(selected))
            .chain(graph.descendants(selected));

        let mut relation_data = Vec::new();
        for hash in order {
            let object = store.get_object(&hash)?;
            let data_list = data_list(&object);
            relation_data.push(RelationNode {
                parent: graph.parent(&hash).cloned(),
                represent_idx: represent_idx(&data_list),
                id: hash,
                data_list,
            });
        }
        Ok(Self {
            selected: selected.clone(),
            relation_data,
        })
    }
}

fn data_list(object: &MetadataObject) -> Vec<RelationData> {
    object
        .iter()
        .map(|(path, entry)| RelationData {
            path: path.clone(),
            name: entry.name.clone(),
            toolchain_name: entry.build_info.as_ref().map(|b| b.toolchain_name.clone()),
            toolchain_version: entry.build_info.as_ref().map(|b| b.toolchain_version.clone()),
            is_deleted: entry.is_deleted,
        })
        .collect()
}

/// First active entry, or 0.
fn represent_idx(data: &[RelationData]) -> usize {
    data.iter().position(|d| !d.is_deleted).unwrap_or(0)
}
