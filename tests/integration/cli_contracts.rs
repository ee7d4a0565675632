use std::fs;
use std::path::PathBuf;

use metasync::tooling::cli::{CliContext, Commands, OutputFormat};
use tempfile::TempDir;

use crate::integration::support::{with_xdg_env, SHA256_X};

fn workspace(temp: &TempDir) -> PathBuf {
    let root = temp.path().join("workspace");
    fs::create_dir_all(&root).unwrap();
    root
}

#[test]
fn scan_json_contract_has_required_fields() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let root = workspace(&temp);
        fs::write(root.join("a.circle"), "X").unwrap();

        let cli = CliContext::new(root, None).unwrap();
        let output = cli
            .execute(&Commands::Scan {
                format: OutputFormat::Json,
            })
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        for field in ["files_indexed", "objects_scanned", "created", "reactivated", "disabled"] {
            assert!(parsed.get(field).and_then(|v| v.as_u64()).is_some(), "{}", field);
        }
        assert_eq!(parsed["created"], 1);
    });
}

#[test]
fn status_json_contract_has_required_fields() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let root = workspace(&temp);
        fs::write(root.join("a.circle"), "X").unwrap();
        fs::write(root.join("b.circle"), "X").unwrap();

        let cli = CliContext::new(root, None).unwrap();
        let output = cli
            .execute(&Commands::Status {
                format: OutputFormat::Json,
            })
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["indexed_files"], 2);
        assert_eq!(parsed["objects"], 1);
        assert_eq!(parsed["active_entries"], 2);
        assert_eq!(parsed["inactive_entries"], 0);
        assert!(parsed["root"].is_string());
    });
}

#[test]
fn object_json_is_keyed_by_path() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let root = workspace(&temp);
        fs::write(root.join("a.circle"), "X").unwrap();

        let cli = CliContext::new(root, None).unwrap();
        let output = cli
            .execute(&Commands::Object {
                hash: SHA256_X.to_string(),
                format: OutputFormat::Json,
            })
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["a.circle"]["name"], "a.circle");
        assert_eq!(parsed["a.circle"]["is-deleted"], false);
    });
}

#[test]
fn link_then_relation_json_lists_parent() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let root = workspace(&temp);
        fs::write(root.join("model.pb"), "graph").unwrap();
        fs::write(root.join("model.circle"), "compiled").unwrap();

        let cli = CliContext::new(root, None).unwrap();
        let linked = cli
            .execute(&Commands::Link {
                child: PathBuf::from("model.circle"),
                parent: PathBuf::from("model.pb"),
            })
            .unwrap();
        assert!(linked.starts_with("Linked"));

        let output = cli
            .execute(&Commands::Relation {
                path: PathBuf::from("model.circle"),
                format: OutputFormat::Json,
            })
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let nodes = parsed["relation_data"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(parsed["selected"], nodes[0]["id"]);
        assert_eq!(nodes[0]["parent"], nodes[1]["id"]);
        assert_eq!(nodes[0]["represent_idx"], 0);
        assert_eq!(nodes[1]["data_list"][0]["path"], "model.pb");
    });
}

#[test]
fn workspace_config_file_is_honoured() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let root = workspace(&temp);
        fs::write(
            root.join(".metasync.toml"),
            "[tracking]\nextensions = [\".bin\"]\n",
        )
        .unwrap();
        fs::write(root.join("a.bin"), "raw").unwrap();
        fs::write(root.join("a.circle"), "X").unwrap();

        let cli = CliContext::new(root, None).unwrap();
        let output = cli
            .execute(&Commands::Status {
                format: OutputFormat::Json,
            })
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["indexed_files"], 1);
    });
}
