//! Metadata Object Store
//!
//! Durable ground truth of the engine: one JSON metadata object per content
//! hash, each mapping relative paths to their metadata entries. Objects are
//! created lazily and never deleted; entries are only marked inactive.

pub mod object;
pub mod persistence;

pub use object::{BuildInfo, MetadataEntry, MetadataObject};
pub use persistence::FsMetadataStore;

use crate::error::StorageError;
use crate::types::ContentHash;
use std::path::Path;

/// Metadata object store interface.
///
/// `get_object` never fails for a missing object; it returns an empty one.
/// `set_object` overwrites, so entry-level helpers below read, splice and
/// write back the whole object.
pub trait MetadataStore: Send + Sync {
    fn get_object(&self, hash: &ContentHash) -> Result<MetadataObject, StorageError>;
    fn set_object(&self, hash: &ContentHash, object: &MetadataObject) -> Result<(), StorageError>;
    /// Every hash with an object on disk, sorted.
    fn list_hashes(&self) -> Result<Vec<ContentHash>, StorageError>;

    fn get_entry(&self, key: &str, hash: &ContentHash) -> Result<Option<MetadataEntry>, StorageError> {
        Ok(self.get_object(hash)?.get(key).cloned())
    }

    fn set_entry(
        &self,
        key: &str,
        hash: &ContentHash,
        entry: MetadataEntry,
    ) -> Result<(), StorageError> {
        let mut object = self.get_object(hash)?;
        object.insert(key, entry);
        self.set_object(hash, &object)
    }

    /// Mark `object[key]` deleted. Absent entries are a no-op.
    fn disable_entry(&self, key: &str, hash: &ContentHash) -> Result<bool, StorageError> {
        let mut object = self.get_object(hash)?;
        if !object.disable(key) {
            return Ok(false);
        }
        self.set_object(hash, &object)?;
        Ok(true)
    }

    fn remove_entry(
        &self,
        key: &str,
        hash: &ContentHash,
    ) -> Result<Option<MetadataEntry>, StorageError> {
        let mut object = self.get_object(hash)?;
        let removed = object.remove(key);
        if removed.is_some() {
            self.set_object(hash, &object)?;
        }
        Ok(removed)
    }

    /// Synthesize a default entry for `key` if none exists. Idempotent.
    fn create_default(
        &self,
        key: &str,
        hash: &ContentHash,
        file: &Path,
    ) -> Result<bool, StorageError> {
        let mut object = self.get_object(hash)?;
        if object.contains(key) {
            return Ok(false);
        }
        object.insert(key, MetadataEntry::from_file(key, file));
        self.set_object(hash, &object)?;
        Ok(true)
    }
}
