use std::fs;

use chrono::Utc;
use metasync::config::MetaSyncConfig;
use metasync::error::{ApiError, StorageError};
use metasync::store::{FsMetadataStore, MetadataEntry, MetadataStore};
use metasync::tree::ContentHasher;
use metasync::workspace::Workspace;
use tempfile::TempDir;

use crate::integration::support::{entry_state, object_file};

#[test]
fn startup_disables_entries_for_missing_files() {
    let temp = TempDir::new().unwrap();
    let store = FsMetadataStore::open(temp.path().join(".meta"));
    let hash = ContentHasher::default().hash_bytes(b"old log");
    let now = Utc::now();
    store
        .set_entry("old.log", &hash, MetadataEntry::new("old.log", now, now))
        .unwrap();

    let ws = Workspace::open(temp.path(), MetaSyncConfig::default()).unwrap();
    assert_eq!(ws.startup_report().disabled, 1);
    assert_eq!(entry_state(&ws, "old.log", &hash), Some(false));
}

#[test]
fn returning_file_is_reactivated_on_next_open() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("model.pb"), "graph").unwrap();
    let ws = Workspace::open(temp.path(), MetaSyncConfig::default()).unwrap();
    let hash = ws.hash_of("model.pb").unwrap();

    fs::rename(temp.path().join("model.pb"), temp.path().join("model.bak")).unwrap();
    let ws = Workspace::open(temp.path(), MetaSyncConfig::default()).unwrap();
    assert_eq!(entry_state(&ws, "model.pb", &hash), Some(false));

    fs::rename(temp.path().join("model.bak"), temp.path().join("model.pb")).unwrap();
    let ws = Workspace::open(temp.path(), MetaSyncConfig::default()).unwrap();
    assert_eq!(ws.startup_report().reactivated, 1);
    assert_eq!(entry_state(&ws, "model.pb", &hash), Some(true));
}

#[test]
fn malformed_object_fails_open() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.circle"), "X").unwrap();
    let ws = Workspace::open(temp.path(), MetaSyncConfig::default()).unwrap();
    let hash = ws.hash_of("a.circle").unwrap();
    fs::write(object_file(&ws, &hash), "{ truncated").unwrap();

    let err = Workspace::open(temp.path(), MetaSyncConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ApiError::Storage(StorageError::MalformedObject { .. })
    ));
}

#[test]
fn blake3_workspace_uses_its_own_objects() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.circle"), "X").unwrap();
    let mut config = MetaSyncConfig::default();
    config.tracking.hash_algorithm = metasync::tree::HashAlgorithm::Blake3;

    let ws = Workspace::open(temp.path(), config).unwrap();
    let hash = ws.hash_of("a.circle").unwrap();
    assert_eq!(hash.as_str(), blake3::hash(b"X").to_hex().as_str());
    assert!(object_file(&ws, &hash).is_file());
}
