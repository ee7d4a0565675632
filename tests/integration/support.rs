use metasync::config::MetaSyncConfig;
use metasync::store::MetadataStore;
use metasync::types::ContentHash;
use metasync::workspace::watch::PendingCreate;
use metasync::workspace::{MetadataLifecycle, Workspace};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Run `f` with `XDG_CONFIG_HOME` pointing into `temp`, so no global config leaks in.
pub fn with_xdg_env<F, R>(temp: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_LOCK.lock();
    let previous = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", temp.path().join("xdg"));
    let result = f();
    match previous {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
    result
}

pub fn open(root: &Path) -> (Workspace, MetadataLifecycle, PendingCreate) {
    open_with(root, MetaSyncConfig::default())
}

pub fn open_with(root: &Path, config: MetaSyncConfig) -> (Workspace, MetadataLifecycle, PendingCreate) {
    let ws = Workspace::open(root, config).unwrap();
    let pending = PendingCreate::default();
    let lifecycle = MetadataLifecycle::new(ws.clone(), pending.clone());
    (ws, lifecycle, pending)
}

pub fn object_file(ws: &Workspace, hash: &ContentHash) -> PathBuf {
    let (prefix, rest) = hash.shard();
    ws.meta_dir()
        .join("hash_objects")
        .join(prefix)
        .join(format!("{}.json", rest))
}

/// `Some(true)` for an active entry, `Some(false)` for an inactive one.
pub fn entry_state(ws: &Workspace, key: &str, hash: &ContentHash) -> Option<bool> {
    ws.store()
        .get_entry(key, hash)
        .unwrap()
        .map(|entry| !entry.is_deleted)
}

pub const SHA256_X: &str = "4b68ab3847feda7d6c62c1fbcbeebfa35eab7351ed5e78f4ddadea5df64b8015";
