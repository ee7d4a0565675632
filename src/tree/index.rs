//! PathIndex: path → content hash tree for the live workspace.

use super::hasher::ContentHasher;
use super::node::{join_key, DirChildren, PathIndexNode};
use super::path::{same_segment, segments};
use crate::error::StorageError;
use crate::types::ContentHash;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// In-memory mirror of the workspace tree restricted to tracked files.
///
/// The root mapping is never pruned; every other directory node exists only
/// while it has at least one descendant file.
#[derive(Debug, Clone)]
pub struct PathIndex {
    workspace_root: PathBuf,
    hasher: ContentHasher,
    tree: DirChildren,
}

impl PathIndex {
    pub fn new(workspace_root: impl Into<PathBuf>, hasher: ContentHasher) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            hasher,
            tree: BTreeMap::new(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn hasher(&self) -> ContentHasher {
        self.hasher
    }

    /// Look up the node at `key`. `None` when any segment is missing.
    pub fn get(&self, key: &str) -> Option<&PathIndexNode> {
        let mut segs = segments(key);
        let mut node = self.tree.get(segs.next()?)?;
        for seg in segs {
            node = node.children()?.get(seg)?;
        }
        Some(node)
    }

    /// Stored spelling of `key`, matching each segment exactly or, failing
    /// that, by NFC-equivalence.
    pub fn resolve(&self, key: &str) -> Option<String> {
        let mut children = &self.tree;
        let mut resolved: Vec<&str> = Vec::new();
        let mut segs = segments(key).peekable();
        while let Some(seg) = segs.next() {
            let (name, node) = children.get_key_value(seg).or_else(|| {
                children
                    .iter()
                    .find(|(name, _)| same_segment(name, seg))
            })?;
            resolved.push(name);
            if segs.peek().is_some() {
                children = node.children()?;
            }
        }
        if resolved.is_empty() {
            return None;
        }
        Some(resolved.join("/"))
    }

    pub fn hash_of(&self, key: &str) -> Option<&ContentHash> {
        self.get(key).and_then(PathIndexNode::as_hash)
    }

    pub fn is_file(&self, key: &str) -> bool {
        self.get(key).map(PathIndexNode::is_file).unwrap_or(false)
    }

    pub fn is_dir(&self, key: &str) -> bool {
        self.get(key).map(PathIndexNode::is_dir).unwrap_or(false)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Direct children keys of a directory; empty for files and unknown keys.
    pub fn files_under_folder(&self, key: &str) -> Vec<String> {
        let children = if key.is_empty() {
            Some(&self.tree)
        } else {
            self.get(key).and_then(PathIndexNode::children)
        };
        children
            .map(|c| c.keys().map(|name| join_key(key, name)).collect())
            .unwrap_or_default()
    }

    /// Every file key at or below `key`.
    pub fn files_recursive(&self, key: &str) -> Vec<String> {
        let mut out = Vec::new();
        if key.is_empty() {
            for (name, child) in &self.tree {
                child.collect_files(name, &mut out);
            }
        } else if let Some(node) = self.get(key) {
            node.collect_files(key, &mut out);
        }
        out.into_iter().map(|(k, _)| k).collect()
    }

    /// Flatten the tree into a sorted path → hash map.
    pub fn flatten(&self) -> BTreeMap<String, ContentHash> {
        let mut out = Vec::new();
        for (name, child) in &self.tree {
            child.collect_files(name, &mut out);
        }
        out.into_iter().collect()
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.flatten().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Place a file leaf at `key`, creating missing directories.
    ///
    /// A file leaf standing where a directory is needed is replaced. Returns
    /// the hash previously stored at `key`, if any.
    pub fn insert(&mut self, key: &str, hash: ContentHash) -> Option<ContentHash> {
        let segs: Vec<&str> = segments(key).collect();
        let (leaf, dirs) = segs.split_last()?;
        let mut current = &mut self.tree;
        for seg in dirs {
            let node = current
                .entry((*seg).to_string())
                .or_insert_with(PathIndexNode::empty_dir);
            if node.is_file() {
                *node = PathIndexNode::empty_dir();
            }
            let PathIndexNode::Directory(children) = node else {
                return None;
            };
            current = children;
        }
        match current.insert((*leaf).to_string(), PathIndexNode::File(hash)) {
            Some(PathIndexNode::File(previous)) => Some(previous),
            _ => None,
        }
    }

    /// Hash the file at `key` from disk and record it.
    pub fn add(&mut self, key: &str) -> Result<ContentHash, StorageError> {
        let hash = self.hasher.hash_file(&self.workspace_root.join(key))?;
        self.insert(key, hash.clone());
        Ok(hash)
    }

    /// Remove the node at `key` and prune directories left empty.
    pub fn delete(&mut self, key: &str) -> Option<PathIndexNode> {
        let segs: Vec<&str> = segments(key).collect();
        remove_and_prune(&mut self.tree, &segs)
    }
}

fn remove_and_prune(children: &mut DirChildren, segs: &[&str]) -> Option<PathIndexNode> {
    let (first, rest) = segs.split_first()?;
    if rest.is_empty() {
        return children.remove(*first);
    }
    let removed = match children.get_mut(*first)? {
        PathIndexNode::Directory(sub) => remove_and_prune(sub, rest),
        PathIndexNode::File(_) => None,
    }?;
    if matches!(children.get(*first), Some(PathIndexNode::Directory(sub)) if sub.is_empty()) {
        children.remove(*first);
    }
    Some(removed)
}
