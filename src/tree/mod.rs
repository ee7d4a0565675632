//! Path Index
//!
//! In-memory tree mirroring the workspace directory structure, mapping each
//! tracked file to the content hash of its bytes.

pub mod hasher;
pub mod index;
pub mod node;
pub mod path;
pub mod walker;

pub use hasher::{ContentHasher, HashAlgorithm};
pub use index::PathIndex;
pub use node::PathIndexNode;
pub use path::TrackedExtensions;
pub use walker::WorkspaceScanner;
