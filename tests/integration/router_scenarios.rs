use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use metasync::workspace::watch::{FileEvent, FileEventRouter, OperationQueue};
use metasync::workspace::Workspace;
use tempfile::TempDir;

use crate::integration::support::{entry_state, open};

const WAIT: Option<Duration> = Some(Duration::from_secs(10));

struct Pipeline {
    ws: Workspace,
    queue: OperationQueue,
    router: FileEventRouter,
}

fn pipeline(root: &Path, window: Duration) -> Pipeline {
    let (ws, lifecycle, pending) = open(root);
    let queue = OperationQueue::start(Arc::new(lifecycle));
    let router = FileEventRouter::new(&ws, pending, queue.sender().unwrap(), window);
    Pipeline { ws, queue, router }
}

#[tokio::test]
async fn os_rename_as_delete_then_create_becomes_move() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.circle"), "X").unwrap();
    let mut p = pipeline(temp.path(), Duration::from_secs(5));
    let hash = p.ws.hash_of("a.circle").unwrap();
    let root = p.ws.root().to_path_buf();

    fs::rename(root.join("a.circle"), root.join("b.circle")).unwrap();
    p.router.route(FileEvent::Deleted(root.join("a.circle"))).unwrap();
    p.router.route(FileEvent::Created(root.join("b.circle"))).unwrap();
    p.queue.wait_idle(WAIT).await.unwrap();

    assert!(p.ws.hash_of("a.circle").is_none());
    assert_eq!(p.ws.hash_of("b.circle"), Some(hash.clone()));
    let object = p.ws.object(&hash).unwrap();
    assert!(!object.contains("a.circle"));
    assert_eq!(entry_state(&p.ws, "b.circle", &hash), Some(true));
}

#[tokio::test]
async fn create_then_delete_becomes_move() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.log"), "log").unwrap();
    let mut p = pipeline(temp.path(), Duration::ZERO);
    let hash = p.ws.hash_of("a.log").unwrap();
    let root = p.ws.root().to_path_buf();

    fs::create_dir_all(root.join("logs")).unwrap();
    fs::rename(root.join("a.log"), root.join("logs/a.log")).unwrap();
    p.router.route(FileEvent::Created(root.join("logs/a.log"))).unwrap();
    p.router.route(FileEvent::Deleted(root.join("a.log"))).unwrap();
    p.queue.wait_idle(WAIT).await.unwrap();

    let object = p.ws.object(&hash).unwrap();
    assert!(!object.contains("a.log"));
    assert_eq!(entry_state(&p.ws, "logs/a.log", &hash), Some(true));
}

#[tokio::test]
async fn unmatched_delete_applies_after_window() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("gone.pb"), "pb").unwrap();
    let mut p = pipeline(temp.path(), Duration::from_millis(20));
    let hash = p.ws.hash_of("gone.pb").unwrap();
    let root = p.ws.root().to_path_buf();

    fs::remove_file(root.join("gone.pb")).unwrap();
    p.router.route(FileEvent::Deleted(root.join("gone.pb"))).unwrap();
    assert!(p.router.has_pending_delete());

    tokio::time::sleep(Duration::from_millis(40)).await;
    p.router.tick().unwrap();
    p.queue.wait_idle(WAIT).await.unwrap();

    assert!(!p.router.has_pending_delete());
    assert!(p.ws.hash_of("gone.pb").is_none());
    assert_eq!(entry_state(&p.ws, "gone.pb", &hash), Some(false));
}

#[tokio::test]
async fn created_directory_expands_to_file_creates() {
    let temp = TempDir::new().unwrap();
    let mut p = pipeline(temp.path(), Duration::ZERO);
    let root = p.ws.root().to_path_buf();

    fs::create_dir_all(root.join("batch/nested")).unwrap();
    fs::write(root.join("batch/one.tflite"), "1").unwrap();
    fs::write(root.join("batch/nested/two.tflite"), "2").unwrap();
    p.router.route(FileEvent::Created(root.join("batch"))).unwrap();
    p.queue.wait_idle(WAIT).await.unwrap();

    for key in ["batch/one.tflite", "batch/nested/two.tflite"] {
        let view = p.ws.entry(key).unwrap().unwrap();
        assert!(!view.entry.is_deleted, "{} should be active", key);
    }
}

#[tokio::test]
async fn changes_inside_meta_dir_and_untracked_files_are_ignored() {
    let temp = TempDir::new().unwrap();
    let mut p = pipeline(temp.path(), Duration::ZERO);
    let root = p.ws.root().to_path_buf();

    fs::write(root.join("notes.md"), "text").unwrap();
    p.router.route(FileEvent::Created(root.join("notes.md"))).unwrap();
    p.router
        .route(FileEvent::Changed(p.ws.meta_dir().join("relation.json")))
        .unwrap();
    p.queue.wait_idle(WAIT).await.unwrap();

    assert!(p.ws.index_snapshot().is_empty());
    drop(p.router);
    let stats = p.queue.shutdown().await.unwrap();
    assert_eq!(stats.failed, 0);
}
