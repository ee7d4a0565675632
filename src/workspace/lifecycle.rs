//! Metadata Entry Lifecycle
//!
//! The queued operations that keep the path index, the metadata objects and
//! the relation graph in step with the filesystem. Each operation runs alone;
//! the queue never starts the next one before the current one returns.

use super::context::Workspace;
use super::watch::queue::{Operation, OperationExecutor};
use super::watch::router::PendingCreate;
use crate::error::{ApiError, StorageError};
use crate::store::{MetadataEntry, MetadataStore};
use crate::tree::path::rebase_key;
use crate::tree::PathIndexNode;
use crate::types::ContentHash;
use tracing::{debug, info, warn};

/// Executes lifecycle operations against one workspace.
pub struct MetadataLifecycle {
    ws: Workspace,
    pending_create: PendingCreate,
}

impl MetadataLifecycle {
    pub fn new(workspace: Workspace, pending_create: PendingCreate) -> Self {
        Self {
            ws: workspace,
            pending_create,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.ws
    }

    /// Content of a known file changed.
    pub fn change_file(&self, key: &str) -> Result<(), ApiError> {
        let Some(old) = self.ws.hash_of(key) else {
            return self.create_file(key);
        };
        let Some(hash) = self.hash(key)? else {
            debug!(path = %key, "Changed file vanished before hashing");
            return Ok(());
        };
        if hash == old {
            debug!(path = %key, "Content unchanged");
            return Ok(());
        }

        self.ws.store().disable_entry(key, &old)?;
        self.ws.index().write().insert(key, hash.clone());
        info!(path = %key, from = %old.short(), to = %hash.short(), "File content changed");
        self.adopt(key, &hash)
    }

    /// A file appeared.
    pub fn create_file(&self, key: &str) -> Result<(), ApiError> {
        if !self.ws.tracked().is_tracked(key) {
            debug!(path = %key, "Ignoring untracked file");
            return Ok(());
        }
        let Some(hash) = self.hash(key)? else {
            debug!(path = %key, "Created file vanished before hashing");
            return Ok(());
        };

        let previous = self.ws.index().write().insert(key, hash.clone());
        if let Some(previous) = previous.filter(|p| *p != hash) {
            self.ws.store().disable_entry(key, &previous)?;
        }
        self.adopt(key, &hash)
    }

    /// A directory appeared; returns a create per tracked file inside it.
    pub fn create_dir(&self, key: &str) -> Result<Vec<Operation>, ApiError> {
        let files = self.tracked_files_under(key)?;
        debug!(path = %key, files = files.len(), "Directory created");
        Ok(files.into_iter().map(Operation::CreateFile).collect())
    }

    /// A file disappeared.
    pub fn delete_file(&self, key: &str) -> Result<(), ApiError> {
        let node = self.ws.index().read().get(key).cloned();
        match node {
            None => {
                debug!(path = %key, "Deleted path was not indexed");
                Ok(())
            }
            Some(PathIndexNode::Directory(_)) => self.delete_dir(key),
            Some(PathIndexNode::File(hash)) => {
                self.ws.store().disable_entry(key, &hash)?;
                self.ws.index().write().delete(key);
                info!(path = %key, hash = %hash.short(), "File deleted");
                Ok(())
            }
        }
    }

    /// A directory disappeared; every indexed file below it is deleted.
    ///
    /// Keeps going past failing children and returns the first error.
    pub fn delete_dir(&self, key: &str) -> Result<(), ApiError> {
        let children = self.ws.index().read().files_under_folder(key);
        let mut first_error = None;
        for child in children {
            let is_dir = self.ws.index().read().is_dir(&child);
            let result = if is_dir {
                self.delete_dir(&child)
            } else {
                self.delete_file(&child)
            };
            if let Err(e) = result {
                warn!(path = %child, error = %e, "Failed to delete child");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// A file moved from `from` to `to`; its entry follows it.
    pub fn move_file(&self, from: &str, to: &str) -> Result<(), ApiError> {
        if from == to {
            return self.change_file(to);
        }
        let tracked = self.ws.tracked();
        match (tracked.is_tracked(from), tracked.is_tracked(to)) {
            (false, false) => return Ok(()),
            (true, false) => return self.delete_file(from),
            (false, true) => return self.create_file(to),
            (true, true) => {}
        }

        let Some(old_hash) = self.ws.hash_of(from) else {
            return self.create_file(to);
        };
        let Some(new_hash) = self.hash(to)? else {
            debug!(from = %from, to = %to, "Move destination vanished");
            return self.delete_file(from);
        };

        let overwritten = {
            let mut index = self.ws.index().write();
            index.delete(from);
            index.insert(to, new_hash.clone())
        };
        let store = self.ws.store();
        if let Some(overwritten) = overwritten.filter(|h| *h != new_hash) {
            store.disable_entry(to, &overwritten)?;
        }

        if old_hash == new_hash {
            let mut object = store.get_object(&old_hash)?;
            if let Some(mut entry) = object.remove(from) {
                entry.rebind(to);
                object.insert(to, entry);
                store.set_object(&old_hash, &object)?;
            }
        } else if let Some(mut entry) = store.remove_entry(from, &old_hash)? {
            entry.rebind(to);
            store.set_entry(to, &new_hash, entry)?;
        }

        info!(from = %from, to = %to, hash = %new_hash.short(), "File moved");
        self.adopt(to, &new_hash)
    }

    /// A directory moved; each tracked file now under `to` is moved from its
    /// counterpart under `from`, and whatever is left under `from` is deleted.
    pub fn move_dir(&self, from: &str, to: &str) -> Result<(), ApiError> {
        let mut first_error = None;
        for dest in self.tracked_files_under(to)? {
            let Some(source) = rebase_key(&dest, to, from) else {
                continue;
            };
            if let Err(e) = self.move_file(&source, &dest) {
                warn!(from = %source, to = %dest, error = %e, "Failed to move file");
                first_error.get_or_insert(e);
            }
        }
        if self.ws.index().read().is_dir(from) {
            if let Err(e) = self.delete_dir(from) {
                first_error.get_or_insert(e);
            }
        }
        info!(from = %from, to = %to, "Directory moved");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Hash the file at `key`; `None` when it no longer exists.
    fn hash(&self, key: &str) -> Result<Option<ContentHash>, ApiError> {
        match self.ws.hasher().hash_file(&self.ws.root().join(key)) {
            Ok(hash) => Ok(Some(hash)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn tracked_files_under(&self, key: &str) -> Result<Vec<String>, ApiError> {
        match self.ws.scanner().tracked_files(&self.ws.root().join(key)) {
            Ok(files) => Ok(files),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Make `key` an active entry of the object at `hash`.
    ///
    /// A path new to the object starts from its seed sibling, or from the
    /// file's timestamps when the object is empty. The object is written only
    /// if something changed.
    fn adopt(&self, key: &str, hash: &ContentHash) -> Result<(), ApiError> {
        let store = self.ws.store();
        let mut object = store.get_object(hash)?;
        let before = object.clone();

        let mut entry = match object.get(key) {
            Some(existing) => existing.clone(),
            None => match object.seed_entry() {
                Some(seed) => {
                    let mut entry = seed.clone();
                    entry.rebind(key);
                    entry
                }
                None => MetadataEntry::from_file(key, &self.ws.root().join(key)),
            },
        };
        entry.is_deleted = false;
        let entry = self.ws.build_info().get(entry, key);
        let input = entry.build_info.as_ref().and_then(|b| b.input.clone());
        object.insert(key, entry);

        if object != before {
            store.set_object(hash, &object)?;
            debug!(path = %key, hash = %hash.short(), "Wrote metadata entry");
        }
        self.record_relation(hash, input.as_deref())?;
        Ok(())
    }

    fn record_relation(&self, hash: &ContentHash, input: Option<&str>) -> Result<(), StorageError> {
        let parent = input.and_then(|i| self.ws.hash_of(i));
        self.ws.relations().update(|graph| {
            let mut changed = graph.ensure(hash);
            if let Some(parent) = &parent {
                changed |= graph.link(hash, parent);
            }
            changed
        })?;
        Ok(())
    }
}

impl OperationExecutor for MetadataLifecycle {
    fn execute(&self, op: &Operation) -> Result<Vec<Operation>, ApiError> {
        match op {
            Operation::ChangeFile(key) => self.change_file(key)?,
            Operation::CreateFile(key) => self.create_file(key)?,
            Operation::CreateDir(key) => return self.create_dir(key),
            Operation::DeleteFile(key) => self.delete_file(key)?,
            Operation::DeleteDir(key) => self.delete_dir(key)?,
            Operation::MoveFile { from, to } => self.move_file(from, to)?,
            Operation::MoveDir { from, to } => self.move_dir(from, to)?,
            Operation::ResetPendingCreate => self.pending_create.clear(),
        }
        Ok(Vec::new())
    }
}
