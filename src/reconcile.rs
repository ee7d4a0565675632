//! Reconciliation Pass
//!
//! Brings the persisted metadata objects in line with a fresh workspace scan:
//! every indexed file gets an active entry under its current hash, and every
//! active entry whose path no longer holds that hash is disabled.

use crate::error::StorageError;
use crate::store::{MetadataEntry, MetadataStore};
use crate::tree::PathIndex;
use serde::Serialize;
use tracing::{debug, info};

/// Counts of what a reconciliation run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub files_indexed: usize,
    pub objects_scanned: usize,
    pub created: usize,
    pub reactivated: usize,
    pub disabled: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.created + self.reactivated + self.disabled > 0
    }
}

pub struct Reconciler<'a> {
    index: &'a PathIndex,
    store: &'a dyn MetadataStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a PathIndex, store: &'a dyn MetadataStore) -> Self {
        Self { index, store }
    }

    /// Run both passes. Malformed objects abort the run.
    pub fn run(&self) -> Result<ReconcileReport, StorageError> {
        let mut report = ReconcileReport::default();
        self.create_pass(&mut report)?;
        self.delete_pass(&mut report)?;
        info!(
            files = report.files_indexed,
            objects = report.objects_scanned,
            created = report.created,
            reactivated = report.reactivated,
            disabled = report.disabled,
            "Reconciliation complete"
        );
        Ok(report)
    }

    fn create_pass(&self, report: &mut ReconcileReport) -> Result<(), StorageError> {
        let root = self.index.workspace_root();
        for (key, hash) in self.index.flatten() {
            report.files_indexed += 1;
            let mut object = self.store.get_object(&hash)?;
            match object.get_mut(&key) {
                Some(entry) if entry.is_deleted => {
                    entry.is_deleted = false;
                    report.reactivated += 1;
                    debug!(path = %key, hash = %hash, "Reactivated entry");
                }
                Some(_) => continue,
                None => {
                    object.insert(key.clone(), MetadataEntry::from_file(&key, &root.join(&key)));
                    report.created += 1;
                    debug!(path = %key, hash = %hash, "Created missing entry");
                }
            }
            self.store.set_object(&hash, &object)?;
        }
        Ok(())
    }

    fn delete_pass(&self, report: &mut ReconcileReport) -> Result<(), StorageError> {
        for hash in self.store.list_hashes()? {
            report.objects_scanned += 1;
            let mut object = self.store.get_object(&hash)?;
            let mut changed = false;
            for (key, entry) in object.iter_mut() {
                if entry.is_deleted || self.index.hash_of(key) == Some(&hash) {
                    continue;
                }
                entry.is_deleted = true;
                changed = true;
                report.disabled += 1;
                debug!(path = %key, hash = %hash, "Disabled stale entry");
            }
            if changed {
                self.store.set_object(&hash, &object)?;
            }
        }
        Ok(())
    }
}
