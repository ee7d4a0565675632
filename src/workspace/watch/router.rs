//! File Event Router
//!
//! Classifies filesystem notifications against the current index and turns
//! them into queued lifecycle operations. Classification is synchronous and
//! touches memory only; all disk work happens later in the queue.
//!
//! Watchers report renames as separate create and delete notifications with
//! nothing linking the two. Two correlation slots pair them up again:
//! - a create is remembered in [`PendingCreate`] until a queued
//!   `ResetPendingCreate` runs, and a delete of a known path arriving in
//!   the meantime becomes a move to the created path;
//! - a delete of a known path is held for the rename window, and a create of
//!   the same kind in the same directory, or with the same file name, becomes
//!   a move from the deleted path.

use super::events::FileEvent;
use super::queue::{Operation, OperationSender};
use crate::error::ApiError;
use crate::tree::path::{file_name, parent_key, relative_key};
use crate::tree::{PathIndex, TrackedExtensions};
use crate::workspace::Workspace;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Single-slot mailbox holding the most recently created path.
#[derive(Debug, Clone, Default)]
pub struct PendingCreate(Arc<Mutex<Option<String>>>);

impl PendingCreate {
    pub fn set(&self, key: impl Into<String>) {
        *self.0.lock() = Some(key.into());
    }

    pub fn take(&self) -> Option<String> {
        self.0.lock().take()
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().take();
    }
}

#[derive(Debug, Clone)]
struct PendingDelete {
    key: String,
    is_dir: bool,
    at: Instant,
}

impl PendingDelete {
    fn into_operation(self) -> Operation {
        if self.is_dir {
            Operation::DeleteDir(self.key)
        } else {
            Operation::DeleteFile(self.key)
        }
    }
}

pub struct FileEventRouter {
    root: PathBuf,
    meta_key: String,
    tracked: TrackedExtensions,
    index: Arc<RwLock<PathIndex>>,
    pending_create: PendingCreate,
    pending_delete: Option<PendingDelete>,
    rename_window: Duration,
    sender: OperationSender,
}

impl FileEventRouter {
    pub fn new(
        workspace: &Workspace,
        pending_create: PendingCreate,
        sender: OperationSender,
        rename_window: Duration,
    ) -> Self {
        Self {
            root: workspace.root().to_path_buf(),
            meta_key: workspace.meta_key().to_string(),
            tracked: workspace.tracked().clone(),
            index: workspace.index_handle(),
            pending_create,
            pending_delete: None,
            rename_window,
            sender,
        }
    }

    /// Classify one notification and enqueue the resulting operations.
    pub fn route(&mut self, event: FileEvent) -> Result<(), ApiError> {
        let ops = self.classify(event, Instant::now());
        self.sender.enqueue_all(ops)
    }

    /// Apply a held delete whose rename window has passed.
    pub fn tick(&mut self) -> Result<(), ApiError> {
        let ops = self.flush_expired(Instant::now());
        self.sender.enqueue_all(ops)
    }

    /// Apply any held delete immediately.
    pub fn flush(&mut self) -> Result<(), ApiError> {
        let ops: Vec<Operation> = self.take_pending_delete().into_iter().collect();
        self.sender.enqueue_all(ops)
    }

    /// Whether a delete is currently waiting for a matching create.
    pub fn has_pending_delete(&self) -> bool {
        self.pending_delete.is_some()
    }

    pub fn classify(&mut self, event: FileEvent, now: Instant) -> Vec<Operation> {
        let mut ops = Vec::new();
        match event {
            FileEvent::Changed(path) => self.on_changed(&path, &mut ops),
            FileEvent::Created(path) => self.on_created(&path, now, &mut ops),
            FileEvent::Deleted(path) => {
                ops.extend(self.take_pending_delete());
                self.on_deleted(&path, now, true, &mut ops);
            }
            FileEvent::Renamed { from, to } => {
                ops.extend(self.take_pending_delete());
                self.on_renamed(&from, &to, now, &mut ops);
            }
        }
        ops
    }

    pub fn flush_expired(&mut self, now: Instant) -> Vec<Operation> {
        match &self.pending_delete {
            Some(held) if now.duration_since(held.at) > self.rename_window => {
                debug!(path = %held.key, "Rename window expired, applying delete");
                self.take_pending_delete().into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    fn take_pending_delete(&mut self) -> Option<Operation> {
        self.pending_delete.take().map(PendingDelete::into_operation)
    }

    /// Workspace key for an event path, skipping the metadata directory.
    fn key_for(&self, path: &Path) -> Option<String> {
        let Some(key) = relative_key(&self.root, path) else {
            debug!(path = %path.display(), "Ignoring event outside the workspace");
            return None;
        };
        if key == self.meta_key || key.starts_with(&format!("{}/", self.meta_key)) {
            return None;
        }
        Some(key)
    }

    fn on_changed(&mut self, path: &Path, ops: &mut Vec<Operation>) {
        let Some(key) = self.key_for(path) else {
            return;
        };
        if self.index.read().is_file(&key) {
            ops.push(Operation::ChangeFile(key));
        } else {
            debug!(path = %key, "Unsupervised file changed");
        }
    }

    fn on_created(&mut self, path: &Path, now: Instant, ops: &mut Vec<Operation>) {
        let Some(key) = self.key_for(path) else {
            return;
        };
        let is_dir = match std::fs::metadata(path) {
            Ok(meta) => meta.is_dir(),
            Err(_) if self.tracked.is_tracked(&key) => false,
            Err(_) => {
                debug!(path = %key, "Created path vanished before classification");
                return;
            }
        };

        if let Some(held) = self.pending_delete.take() {
            if self.correlates(&held, &key, is_dir, now) {
                info!(from = %held.key, to = %key, "Correlated delete and create into a move");
                ops.push(if is_dir {
                    Operation::MoveDir { from: held.key, to: key }
                } else {
                    Operation::MoveFile { from: held.key, to: key }
                });
                return;
            }
            ops.push(held.into_operation());
        }

        if is_dir {
            ops.push(Operation::CreateDir(key.clone()));
        } else if self.tracked.is_tracked(&key) {
            if self.index.read().is_file(&key) {
                // Some editors and tools save by re-creating the file.
                ops.push(Operation::ChangeFile(key.clone()));
            } else {
                ops.push(Operation::CreateFile(key.clone()));
            }
        } else {
            debug!(path = %key, "Unsupervised file created");
        }
        self.pending_create.set(key);
        ops.push(Operation::ResetPendingCreate);
    }

    fn on_deleted(&mut self, path: &Path, now: Instant, may_hold: bool, ops: &mut Vec<Operation>) {
        let Some(key) = self.key_for(path) else {
            return;
        };
        let is_dir = match self.index.read().get(&key) {
            Some(node) => node.is_dir(),
            None => {
                debug!(path = %key, "Unsupervised path removed");
                return;
            }
        };

        if let Some(to) = self.pending_create.take() {
            if to != key {
                info!(from = %key, to = %to, "Correlated create and delete into a move");
                ops.push(if is_dir {
                    Operation::MoveDir { from: key, to }
                } else {
                    Operation::MoveFile { from: key, to }
                });
                return;
            }
        }

        let held = PendingDelete {
            key,
            is_dir,
            at: now,
        };
        if may_hold && !self.rename_window.is_zero() {
            self.pending_delete = Some(held);
        } else {
            ops.push(held.into_operation());
        }
    }

    fn on_renamed(&mut self, from: &Path, to: &Path, now: Instant, ops: &mut Vec<Operation>) {
        let from_key = self.key_for(from);
        let to_key = self.key_for(to);
        let (from_key, to_key) = match (from_key, to_key) {
            (Some(f), Some(t)) => (f, t),
            (None, Some(_)) => return self.on_created(to, now, ops),
            (Some(_), None) => return self.on_deleted(from, now, false, ops),
            (None, None) => return,
        };

        let from_is_dir = self.index.read().get(&from_key).map(|n| n.is_dir());
        match from_is_dir {
            Some(true) => ops.push(Operation::MoveDir {
                from: from_key,
                to: to_key,
            }),
            Some(false) => ops.push(Operation::MoveFile {
                from: from_key,
                to: to_key,
            }),
            None => self.on_created(to, now, ops),
        }
    }

    fn correlates(&self, held: &PendingDelete, key: &str, is_dir: bool, now: Instant) -> bool {
        held.is_dir == is_dir
            && held.key != key
            && now.duration_since(held.at) <= self.rename_window
            && (parent_key(&held.key) == parent_key(key) || file_name(&held.key) == file_name(key))
    }
}
