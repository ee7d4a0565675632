use std::fs;

use metasync::config::{MetaSyncConfig, ToolchainConfig};
use metasync::store::MetadataStore;
use metasync::workspace::watch::{Operation, OperationExecutor};
use tempfile::TempDir;

use crate::integration::support::{entry_state, object_file, open, open_with, SHA256_X};

#[test]
fn create_event_writes_pretty_object_under_sha256() {
    let temp = TempDir::new().unwrap();
    let (ws, lifecycle, _) = open(temp.path());
    fs::write(temp.path().join("a.circle"), "X").unwrap();

    lifecycle
        .execute(&Operation::CreateFile("a.circle".into()))
        .unwrap();

    let hash = ws.hash_of("a.circle").unwrap();
    assert_eq!(hash.as_str(), SHA256_X);

    let raw = fs::read_to_string(object_file(&ws, &hash)).unwrap();
    assert!(raw.contains("\n    \"a.circle\": {"));
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &value["a.circle"];
    assert_eq!(entry["name"], "a.circle");
    assert_eq!(entry["file-extension"], "circle");
    assert_eq!(entry["is-deleted"], false);
    assert!(entry["created-time"].is_string());
    assert!(entry["modified-time"].is_string());
}

#[test]
fn repeated_create_leaves_object_untouched() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.circle"), "X").unwrap();
    let (ws, lifecycle, _) = open(temp.path());
    let hash = ws.hash_of("a.circle").unwrap();
    let before = fs::read(object_file(&ws, &hash)).unwrap();

    lifecycle.create_file("a.circle").unwrap();
    lifecycle.create_file("a.circle").unwrap();

    assert_eq!(fs::read(object_file(&ws, &hash)).unwrap(), before);
}

#[test]
fn decomposed_file_name_is_indexed_and_tracked() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("cafe\u{0301}.log"), "startup").unwrap();
    let (ws, lifecycle, _) = open(temp.path());
    assert_eq!(ws.startup_report().files_indexed, 1);

    fs::write(temp.path().join("nai\u{0308}ve.log"), "later").unwrap();
    let key = ws.key_for(&temp.path().join("nai\u{0308}ve.log")).unwrap();
    lifecycle.create_file(&key).unwrap();

    let hash = ws.hash_of(&key).unwrap();
    assert_eq!(entry_state(&ws, &key, &hash), Some(true));
    assert_eq!(ws.index_snapshot().len(), 2);
}

#[test]
fn identical_content_shares_one_object() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("copies")).unwrap();
    fs::write(temp.path().join("a.onnx"), "weights").unwrap();
    let (ws, lifecycle, _) = open(temp.path());
    let hash = ws.hash_of("a.onnx").unwrap();

    fs::write(temp.path().join("copies/b.onnx"), "weights").unwrap();
    lifecycle.create_file("copies/b.onnx").unwrap();
    assert_eq!(ws.hash_of("copies/b.onnx"), Some(hash.clone()));
    assert_eq!(ws.store().list_hashes().unwrap(), vec![hash.clone()]);

    fs::remove_file(temp.path().join("a.onnx")).unwrap();
    lifecycle.delete_file("a.onnx").unwrap();
    assert_eq!(entry_state(&ws, "a.onnx", &hash), Some(false));
    assert_eq!(entry_state(&ws, "copies/b.onnx", &hash), Some(true));
}

#[test]
fn deleting_directory_disables_entries_and_prunes_index() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("dir")).unwrap();
    fs::write(temp.path().join("dir/x.log"), "log").unwrap();
    fs::write(temp.path().join("keep.log"), "keep").unwrap();
    let (ws, lifecycle, _) = open(temp.path());
    let hash = ws.hash_of("dir/x.log").unwrap();

    fs::remove_dir_all(temp.path().join("dir")).unwrap();
    lifecycle
        .execute(&Operation::DeleteDir("dir".into()))
        .unwrap();

    let index = ws.index_snapshot();
    assert!(!index.exists("dir"));
    assert!(index.is_file("keep.log"));
    assert_eq!(entry_state(&ws, "dir/x.log", &hash), Some(false));
}

#[test]
fn move_keeps_entry_fields() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.circle"), "X").unwrap();
    let (ws, lifecycle, _) = open(temp.path());
    let hash = ws.hash_of("a.circle").unwrap();
    let original = ws.store().get_entry("a.circle", &hash).unwrap().unwrap();

    fs::create_dir_all(temp.path().join("out")).unwrap();
    fs::rename(temp.path().join("a.circle"), temp.path().join("out/b.circle")).unwrap();
    lifecycle
        .execute(&Operation::MoveFile {
            from: "a.circle".into(),
            to: "out/b.circle".into(),
        })
        .unwrap();

    let object = ws.object(&hash).unwrap();
    assert!(!object.contains("a.circle"));
    let moved = object.get("out/b.circle").unwrap();
    assert_eq!(moved.name, "b.circle");
    assert_eq!(moved.created_time, original.created_time);
    assert!(!moved.is_deleted);
}

#[test]
fn toolchain_build_info_links_artifact_to_its_input() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("model.pb"), "graph").unwrap();
    fs::write(
        temp.path().join("model.cfg"),
        "[onecc]\none-import-tf=True\n\n[one-import-tf]\ninput_path=model.pb\noutput_path=model.circle\n",
    )
    .unwrap();
    let config = MetaSyncConfig {
        toolchain: Some(ToolchainConfig {
            name: "onecc".to_string(),
            version: "1.24.0".to_string(),
        }),
        ..MetaSyncConfig::default()
    };
    let (ws, lifecycle, _) = open_with(temp.path(), config);

    fs::write(temp.path().join("model.circle"), "compiled").unwrap();
    lifecycle.create_file("model.circle").unwrap();

    let view = ws.entry("model.circle").unwrap().unwrap();
    let info = view.entry.build_info.unwrap();
    assert_eq!(info.toolchain_name, "onecc");
    assert_eq!(info.input.as_deref(), Some("model.pb"));

    let relation = ws.relation("model.circle").unwrap().unwrap();
    let source = ws.hash_of("model.pb").unwrap();
    assert_eq!(relation.relation_data[0].parent, Some(source.clone()));
    assert_eq!(relation.relation_data[1].id, source);
}
