//! Path index node types

use crate::types::ContentHash;
use std::collections::BTreeMap;

/// Child mapping of a directory node, sorted by name.
pub type DirChildren = BTreeMap<String, PathIndexNode>;

/// Node of the path index: a file leaf carrying its content hash, or a
/// directory mapping names to child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathIndexNode {
    File(ContentHash),
    Directory(DirChildren),
}

impl PathIndexNode {
    pub fn empty_dir() -> Self {
        PathIndexNode::Directory(BTreeMap::new())
    }

    pub fn is_file(&self) -> bool {
        matches!(self, PathIndexNode::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, PathIndexNode::Directory(_))
    }

    pub fn as_hash(&self) -> Option<&ContentHash> {
        match self {
            PathIndexNode::File(hash) => Some(hash),
            PathIndexNode::Directory(_) => None,
        }
    }

    pub fn children(&self) -> Option<&DirChildren> {
        match self {
            PathIndexNode::Directory(children) => Some(children),
            PathIndexNode::File(_) => None,
        }
    }

    /// Visit every file leaf below this node, yielding `prefix`-joined keys.
    pub(crate) fn collect_files(&self, prefix: &str, out: &mut Vec<(String, ContentHash)>) {
        match self {
            PathIndexNode::File(hash) => out.push((prefix.to_string(), hash.clone())),
            PathIndexNode::Directory(children) => {
                for (name, child) in children {
                    child.collect_files(&join_key(prefix, name), out);
                }
            }
        }
    }
}

/// Join a parent key and a child name with `/`, treating `""` as the root.
pub(crate) fn join_key(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}
