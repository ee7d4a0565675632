//! Watch daemon and runtime logic.

use super::events::RenameAssembler;
use super::queue::{OperationQueue, QueueStats};
use super::router::{FileEventRouter, PendingCreate};
use crate::config::WatchSettings;
use crate::error::ApiError;
use crate::workspace::{MetadataLifecycle, Workspace};
use notify::{Event, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

/// Watch mode daemon
pub struct WatchDaemon {
    workspace: Workspace,
    settings: WatchSettings,
    running: Arc<RwLock<bool>>,
    stop: Arc<Notify>,
}

/// Handle that stops a running daemon from another task.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<RwLock<bool>>,
    stop: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        *self.running.write() = false;
        self.stop.notify_one();
    }
}

impl WatchDaemon {
    /// Create a new watch daemon
    pub fn new(workspace: Workspace) -> Self {
        let settings = workspace.config().watch.clone();
        Self {
            workspace,
            settings,
            running: Arc::new(RwLock::new(false)),
            stop: Arc::new(Notify::new()),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            stop: Arc::clone(&self.stop),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Watch the workspace until Ctrl-C or [`StopHandle::stop`].
    ///
    /// Operations still queued at shutdown are run before this returns.
    pub async fn run(&self) -> Result<QueueStats, ApiError> {
        *self.running.write() = true;

        let pending_create = PendingCreate::default();
        let lifecycle = MetadataLifecycle::new(self.workspace.clone(), pending_create.clone());
        let queue = OperationQueue::start(Arc::new(lifecycle));
        let mut router = FileEventRouter::new(
            &self.workspace,
            pending_create,
            queue.sender()?,
            self.settings.rename_window(),
        );
        let mut assembler = RenameAssembler::new(self.settings.rename_window());

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            if tx.send(res).is_err() {
                debug!("Watch event dropped after shutdown");
            }
        })
        .map_err(|e| ApiError::WatchError(format!("Failed to create watcher: {}", e)))?;
        watcher
            .watch(self.workspace.root(), RecursiveMode::Recursive)
            .map_err(|e| ApiError::WatchError(format!("Failed to watch directory: {}", e)))?;

        info!(workspace = %self.workspace.root().display(), "Watching workspace");

        let mut ticker = tokio::time::interval(self.settings.tick());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while *self.running.read() {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(Ok(event)) => {
                        for file_event in assembler.push(event) {
                            debug!(kind = file_event.kind(), "Filesystem event");
                            router.route(file_event)?;
                        }
                    }
                    Some(Err(e)) => warn!("Watch error: {}", e),
                    None => {
                        error!("Watcher channel disconnected");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if let Some(stale) = assembler.flush_stale(Instant::now()) {
                        router.route(stale)?;
                    }
                    router.tick()?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received, stopping watch");
                    break;
                }
                _ = self.stop.notified() => break,
            }
        }
        *self.running.write() = false;
        drop(watcher);

        if let Some(stale) = assembler.drain() {
            router.route(stale)?;
        }
        router.flush()?;
        drop(router);

        let stats = queue.shutdown().await?;
        info!(
            completed = stats.completed,
            failed = stats.failed,
            "Watch stopped"
        );
        Ok(stats)
    }
}
