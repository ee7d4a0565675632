//! metasync: content-addressed metadata synchronization
//!
//! Keeps a store of per-file metadata keyed by content hash in step with a
//! live workspace, so metadata follows files across edits, copies, renames
//! and moves.

pub mod build_info;
pub mod config;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod relation;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod workspace;
