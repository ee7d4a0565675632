//! Workspace context
//!
//! One `Workspace` per open root. It owns the live path index and the
//! handles to the persisted stores, and serves the read-only queries used by
//! viewers. Mutations go through [`super::MetadataLifecycle`].

use super::types::{EntryView, WorkspaceStatus};
use crate::build_info::{BuildInfoSource, NoBuildInfo, ToolchainBuildInfo};
use crate::config::MetaSyncConfig;
use crate::error::ApiError;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::relation::{RelationInfo, RelationStore};
use crate::store::{FsMetadataStore, MetadataObject, MetadataStore};
use crate::tree::path::{canonicalize_path, relative_key};
use crate::tree::{ContentHasher, PathIndex, TrackedExtensions, WorkspaceScanner};
use crate::types::ContentHash;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// An open workspace. Cheap to clone; clones share the index and stores.
#[derive(Clone)]
pub struct Workspace {
    root: PathBuf,
    meta_dir: PathBuf,
    meta_key: String,
    config: Arc<MetaSyncConfig>,
    tracked: TrackedExtensions,
    hasher: ContentHasher,
    index: Arc<RwLock<PathIndex>>,
    store: Arc<dyn MetadataStore>,
    relations: RelationStore,
    build_info: Arc<dyn BuildInfoSource>,
    startup: ReconcileReport,
}

impl Workspace {
    /// Open `root`: scan it, then reconcile the stored metadata with the scan.
    ///
    /// Build info comes from `config.toolchain` when set.
    pub fn open(root: impl AsRef<Path>, config: MetaSyncConfig) -> Result<Self, ApiError> {
        let root = canonicalize_path(root.as_ref())?;
        let build_info: Arc<dyn BuildInfoSource> = match &config.toolchain {
            Some(toolchain) => Arc::new(ToolchainBuildInfo::new(toolchain.clone(), root.clone())),
            None => Arc::new(NoBuildInfo),
        };
        Self::open_with(root, config, build_info)
    }

    /// Open with an explicit build info source.
    pub fn open_with(
        root: impl AsRef<Path>,
        config: MetaSyncConfig,
        build_info: Arc<dyn BuildInfoSource>,
    ) -> Result<Self, ApiError> {
        config.validate()?;
        let root = canonicalize_path(root.as_ref())?;
        let meta_key = config.tracking.meta_dir.to_string_lossy().into_owned();
        let meta_dir = root.join(&config.tracking.meta_dir);

        let mut workspace = Self {
            store: Arc::new(FsMetadataStore::open(&meta_dir)),
            relations: RelationStore::open(&meta_dir),
            tracked: config.tracking.tracked_extensions(),
            hasher: config.tracking.hasher(),
            index: Arc::new(RwLock::new(PathIndex::new(root.clone(), config.tracking.hasher()))),
            config: Arc::new(config),
            build_info,
            startup: ReconcileReport::default(),
            root,
            meta_dir,
            meta_key,
        };
        workspace.startup = workspace.reconcile()?;
        info!(
            root = %workspace.root.display(),
            files = workspace.startup.files_indexed,
            "Opened workspace"
        );
        Ok(workspace)
    }

    /// Rescan the tree, replace the index, and reconcile the stores with it.
    pub fn reconcile(&self) -> Result<ReconcileReport, ApiError> {
        let index = self.scanner().scan()?;
        let report = Reconciler::new(&index, self.store.as_ref()).run()?;
        *self.index.write() = index;
        Ok(report)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the metadata directory.
    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    /// Metadata directory as a workspace key.
    pub fn meta_key(&self) -> &str {
        &self.meta_key
    }

    pub fn config(&self) -> &MetaSyncConfig {
        &self.config
    }

    pub fn tracked(&self) -> &TrackedExtensions {
        &self.tracked
    }

    pub fn hasher(&self) -> ContentHasher {
        self.hasher
    }

    pub fn store(&self) -> &dyn MetadataStore {
        self.store.as_ref()
    }

    pub fn relations(&self) -> &RelationStore {
        &self.relations
    }

    pub fn build_info(&self) -> &dyn BuildInfoSource {
        self.build_info.as_ref()
    }

    /// Report of the reconciliation run by `open`.
    pub fn startup_report(&self) -> &ReconcileReport {
        &self.startup
    }

    pub fn scanner(&self) -> WorkspaceScanner {
        WorkspaceScanner::new(
            self.root.clone(),
            self.config.tracking.meta_dir.clone(),
            self.tracked.clone(),
            self.hasher,
        )
    }

    pub(crate) fn index_handle(&self) -> Arc<RwLock<PathIndex>> {
        Arc::clone(&self.index)
    }

    pub(crate) fn index(&self) -> &RwLock<PathIndex> {
        &self.index
    }

    /// Copy of the current index.
    pub fn index_snapshot(&self) -> PathIndex {
        self.index.read().clone()
    }

    /// Workspace key for a user-supplied path.
    ///
    /// Relative paths are taken relative to the workspace root. A path that
    /// differs from an indexed key only in Unicode normalization resolves to
    /// the indexed spelling.
    pub fn key_for(&self, path: &Path) -> Result<String, ApiError> {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        // Resolve symlinks and `..` when the path still exists.
        let abs = canonicalize_path(&abs).unwrap_or(abs);
        let key = relative_key(&self.root, &abs)
            .ok_or_else(|| ApiError::PathOutsideWorkspace(path.to_path_buf()))?;
        Ok(self.index.read().resolve(&key).unwrap_or(key))
    }

    pub fn hash_of(&self, key: &str) -> Option<ContentHash> {
        self.index.read().hash_of(key).cloned()
    }

    pub fn object(&self, hash: &ContentHash) -> Result<MetadataObject, ApiError> {
        Ok(self.store.get_object(hash)?)
    }

    /// Entry of an indexed path. `None` if the path is not indexed or has no entry.
    pub fn entry(&self, key: &str) -> Result<Option<EntryView>, ApiError> {
        let Some(hash) = self.hash_of(key) else {
            return Ok(None);
        };
        let object = self.store.get_object(&hash)?;
        let Some(entry) = object.get(key).cloned() else {
            return Ok(None);
        };
        let siblings = object
            .iter()
            .map(|(path, _)| path)
            .filter(|path| path.as_str() != key)
            .cloned()
            .collect();
        Ok(Some(EntryView {
            path: key.to_string(),
            hash,
            siblings,
            entry,
        }))
    }

    /// Relation view around the hash of an indexed path.
    pub fn relation(&self, key: &str) -> Result<Option<RelationInfo>, ApiError> {
        let Some(hash) = self.hash_of(key) else {
            return Ok(None);
        };
        self.relation_of(&hash).map(Some)
    }

    pub fn relation_of(&self, hash: &ContentHash) -> Result<RelationInfo, ApiError> {
        let graph = self.relations.load()?;
        Ok(RelationInfo::collect(&graph, self.store.as_ref(), hash)?)
    }

    /// Record `parent` as the source `child` was built from.
    pub fn link(&self, child: &str, parent: &str) -> Result<bool, ApiError> {
        let child_hash = self
            .hash_of(child)
            .ok_or_else(|| ApiError::PathNotIndexed(child.to_string()))?;
        let parent_hash = self
            .hash_of(parent)
            .ok_or_else(|| ApiError::PathNotIndexed(parent.to_string()))?;
        Ok(self.relations.link(&child_hash, &parent_hash)?)
    }

    pub fn status(&self) -> Result<WorkspaceStatus, ApiError> {
        let mut status = WorkspaceStatus {
            root: self.root.display().to_string(),
            meta_dir: self.meta_dir.display().to_string(),
            indexed_files: self.index.read().len(),
            objects: 0,
            active_entries: 0,
            inactive_entries: 0,
            relation_nodes: self.relations.load()?.len(),
        };
        for hash in self.store.list_hashes()? {
            let object = self.store.get_object(&hash)?;
            status.objects += 1;
            status.active_entries += object.active_count();
            status.inactive_entries += object.len() - object.active_count();
        }
        Ok(status)
    }
}
