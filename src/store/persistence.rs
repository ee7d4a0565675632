//! Sharded JSON persistence for metadata objects.
//!
//! Each object lives at `<meta>/hash_objects/XX/YYYY....json` where `XX` is
//! the first two hex characters of the hash and `YYYY...` the rest.

use super::{MetadataObject, MetadataStore};
use crate::error::StorageError;
use crate::types::ContentHash;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const OBJECTS_DIR: &str = "hash_objects";
const OBJECT_EXT: &str = "json";

/// Filesystem-backed metadata object store.
#[derive(Debug, Clone)]
pub struct FsMetadataStore {
    objects_dir: PathBuf,
}

impl FsMetadataStore {
    /// Open the store rooted at the metadata directory (e.g. `<root>/.meta`).
    pub fn open(meta_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: meta_dir.as_ref().join(OBJECTS_DIR),
        }
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// File path of the object for `hash`.
    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        let (prefix, rest) = hash.shard();
        self.objects_dir
            .join(prefix)
            .join(format!("{}.{}", rest, OBJECT_EXT))
    }
}

/// Write `value` as 4-space indented JSON, creating parent directories.
///
/// Goes through a temporary sibling and a rename so readers never observe a
/// truncated file.
pub(crate) fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &buf).map_err(|e| StorageError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))
}

impl MetadataStore for FsMetadataStore {
    fn get_object(&self, hash: &ContentHash) -> Result<MetadataObject, StorageError> {
        let path = self.object_path(hash);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(MetadataObject::new()),
            Err(e) => return Err(StorageError::io(path, e)),
        };
        serde_json::from_str(&content)
            .map_err(|source| StorageError::MalformedObject { path, source })
    }

    fn set_object(&self, hash: &ContentHash, object: &MetadataObject) -> Result<(), StorageError> {
        write_pretty_json(&self.object_path(hash), object)?;
        debug!(hash = %hash, entries = object.len(), "Wrote metadata object");
        Ok(())
    }

    fn list_hashes(&self) -> Result<Vec<ContentHash>, StorageError> {
        let shards = match fs::read_dir(&self.objects_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.objects_dir, e)),
        };

        let mut hashes = Vec::new();
        for shard in shards {
            let shard = shard.map_err(|e| StorageError::io(&self.objects_dir, e))?;
            let shard_path = shard.path();
            if !shard_path.is_dir() {
                continue;
            }
            let Some(prefix) = shard.file_name().to_str().map(str::to_string) else {
                warn!("Skipping non-UTF8 shard directory: {:?}", shard_path);
                continue;
            };

            let files = fs::read_dir(&shard_path).map_err(|e| StorageError::io(&shard_path, e))?;
            for file in files {
                let file = file.map_err(|e| StorageError::io(&shard_path, e))?;
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some(OBJECT_EXT) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match ContentHash::from_shard(&prefix, stem) {
                    Ok(hash) => hashes.push(hash),
                    Err(_) => warn!("Ignoring unrecognized file in object store: {}", path.display()),
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MetadataEntry;
    use crate::tree::ContentHasher;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsMetadataStore, ContentHash) {
        let temp = TempDir::new().unwrap();
        let store = FsMetadataStore::open(temp.path().join(".meta"));
        let hash = ContentHasher::default().hash_bytes(b"X");
        (temp, store, hash)
    }

    #[test]
    fn test_object_path_is_sharded() {
        let store = FsMetadataStore::open("/ws/.meta");
        let hash = ContentHasher::default().hash_bytes(b"X");
        assert_eq!(
            store.object_path(&hash),
            PathBuf::from(
                "/ws/.meta/hash_objects/4b/68ab3847feda7d6c62c1fbcbeebfa35eab7351ed5e78f4ddadea5df64b8015.json"
            )
        );
    }

    #[test]
    fn test_missing_object_is_empty() {
        let (_temp, store, hash) = setup();
        assert!(store.get_object(&hash).unwrap().is_empty());
        assert!(store.list_hashes().unwrap().is_empty());
    }

    #[test]
    fn test_set_get_roundtrip_and_listing() {
        let (temp, store, hash) = setup();
        let file = temp.path().join("a.circle");
        std::fs::write(&file, "X").unwrap();

        assert!(store.create_default("a.circle", &hash, &file).unwrap());
        let obj = store.get_object(&hash).unwrap();
        assert_eq!(obj.get("a.circle").unwrap().file_extension, "circle");
        assert_eq!(store.list_hashes().unwrap(), vec![hash.clone()]);

        let raw = std::fs::read_to_string(store.object_path(&hash)).unwrap();
        assert!(raw.contains("\n    \"a.circle\": {"));
        assert!(!store.object_path(&hash).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_create_default_is_idempotent() {
        let (temp, store, hash) = setup();
        let file = temp.path().join("a.log");
        std::fs::write(&file, "X").unwrap();
        assert!(store.create_default("a.log", &hash, &file).unwrap());
        let before = std::fs::read(store.object_path(&hash)).unwrap();
        assert!(!store.create_default("a.log", &hash, &file).unwrap());
        assert_eq!(std::fs::read(store.object_path(&hash)).unwrap(), before);
    }

    #[test]
    fn test_set_entry_keeps_siblings() {
        let (_temp, store, hash) = setup();
        let now = chrono::Utc::now();
        store
            .set_entry("a.log", &hash, MetadataEntry::new("a.log", now, now))
            .unwrap();
        store
            .set_entry("b.log", &hash, MetadataEntry::new("b.log", now, now))
            .unwrap();
        let obj = store.get_object(&hash).unwrap();
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn test_disable_and_remove_absent_are_noops() {
        let (_temp, store, hash) = setup();
        assert!(!store.disable_entry("none.log", &hash).unwrap());
        assert!(store.remove_entry("none.log", &hash).unwrap().is_none());
        assert!(!store.object_path(&hash).exists());
    }

    #[test]
    fn test_disable_marks_deleted() {
        let (_temp, store, hash) = setup();
        let now = chrono::Utc::now();
        store
            .set_entry("a.log", &hash, MetadataEntry::new("a.log", now, now))
            .unwrap();
        assert!(store.disable_entry("a.log", &hash).unwrap());
        assert!(store.get_entry("a.log", &hash).unwrap().unwrap().is_deleted);
    }

    #[test]
    fn test_malformed_object_is_an_error() {
        let (_temp, store, hash) = setup();
        let path = store.object_path(&hash);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let err = store.get_object(&hash).unwrap_err();
        assert!(matches!(err, StorageError::MalformedObject { .. }));
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let (_temp, store, hash) = setup();
        store.set_object(&hash, &MetadataObject::new()).unwrap();
        let shard = store.object_path(&hash).parent().unwrap().to_path_buf();
        std::fs::write(shard.join("README.txt"), "x").unwrap();
        std::fs::write(shard.join("short.json"), "{}").unwrap();
        assert_eq!(store.list_hashes().unwrap(), vec![hash]);
    }
}
