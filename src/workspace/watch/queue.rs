//! Operation Queue
//!
//! Strict FIFO of metadata lifecycle operations. A single worker task takes
//! one operation at a time and runs it to completion on the blocking pool
//! before looking at the next, so no two operations ever interleave their
//! read-modify-write cycles on the index or the object store.

use crate::error::ApiError;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// A queued lifecycle operation. Paths are workspace keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ChangeFile(String),
    CreateFile(String),
    CreateDir(String),
    DeleteFile(String),
    DeleteDir(String),
    MoveFile { from: String, to: String },
    MoveDir { from: String, to: String },
    /// Clear the router's pending-create slot.
    ResetPendingCreate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ChangeFile(p) => write!(f, "change-file {}", p),
            Operation::CreateFile(p) => write!(f, "create-file {}", p),
            Operation::CreateDir(p) => write!(f, "create-dir {}", p),
            Operation::DeleteFile(p) => write!(f, "delete-file {}", p),
            Operation::DeleteDir(p) => write!(f, "delete-dir {}", p),
            Operation::MoveFile { from, to } => write!(f, "move-file {} -> {}", from, to),
            Operation::MoveDir { from, to } => write!(f, "move-dir {} -> {}", from, to),
            Operation::ResetPendingCreate => f.write_str("reset-pending-create"),
        }
    }
}

/// Runs operations taken off the queue.
///
/// Returned operations are appended to the tail of the queue.
pub trait OperationExecutor: Send + Sync + 'static {
    fn execute(&self, op: &Operation) -> Result<Vec<Operation>, ApiError>;
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Operations waiting to run
    pub pending: usize,
    /// Operations currently running (0 or 1)
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Cloneable producer side of the queue.
#[derive(Clone)]
pub struct OperationSender {
    tx: mpsc::UnboundedSender<Operation>,
    stats: Arc<RwLock<QueueStats>>,
}

impl OperationSender {
    pub fn enqueue(&self, op: Operation) -> Result<(), ApiError> {
        self.stats.write().pending += 1;
        debug!(op = %op, "Enqueued operation");
        self.tx.send(op).map_err(|_| {
            let mut stats = self.stats.write();
            stats.pending = stats.pending.saturating_sub(1);
            ApiError::QueueClosed
        })
    }

    pub fn enqueue_all(&self, ops: impl IntoIterator<Item = Operation>) -> Result<(), ApiError> {
        for op in ops {
            self.enqueue(op)?;
        }
        Ok(())
    }
}

/// Single-consumer FIFO operation queue.
pub struct OperationQueue {
    sender: Option<OperationSender>,
    stats: Arc<RwLock<QueueStats>>,
    worker: Option<JoinHandle<()>>,
}

impl OperationQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(executor: Arc<dyn OperationExecutor>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RwLock::new(QueueStats::default()));
        let worker = tokio::spawn(Self::worker_loop(rx, executor, Arc::clone(&stats)));
        Self {
            sender: Some(OperationSender {
                tx,
                stats: Arc::clone(&stats),
            }),
            stats,
            worker: Some(worker),
        }
    }

    pub fn sender(&self) -> Result<OperationSender, ApiError> {
        self.sender.clone().ok_or(ApiError::QueueClosed)
    }

    pub fn enqueue(&self, op: Operation) -> Result<(), ApiError> {
        self.sender
            .as_ref()
            .ok_or(ApiError::QueueClosed)?
            .enqueue(op)
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    /// Wait until nothing is pending or running.
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> Result<(), ApiError> {
        let start = Instant::now();
        loop {
            {
                let stats = self.stats.read();
                if stats.pending == 0 && stats.processing == 0 {
                    return Ok(());
                }
            }
            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    return Err(ApiError::WatchError(
                        "Timeout waiting for operation queue to drain".to_string(),
                    ));
                }
            }
            sleep(Duration::from_millis(5)).await;
        }
    }

    /// Stop accepting work, finish everything already queued, and join the worker.
    ///
    /// Senders handed out earlier must be dropped for the worker to finish.
    pub async fn shutdown(mut self) -> Result<QueueStats, ApiError> {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            worker
                .await
                .map_err(|e| ApiError::WatchError(format!("Queue worker failed: {}", e)))?;
        }
        let stats = self.stats();
        info!(
            completed = stats.completed,
            failed = stats.failed,
            "Operation queue stopped"
        );
        Ok(stats)
    }

    async fn worker_loop(
        mut rx: mpsc::UnboundedReceiver<Operation>,
        executor: Arc<dyn OperationExecutor>,
        stats: Arc<RwLock<QueueStats>>,
    ) {
        debug!("Operation worker started");
        let mut backlog: VecDeque<Operation> = VecDeque::new();

        loop {
            let op = match backlog.pop_front() {
                Some(op) => op,
                None => match rx.recv().await {
                    Some(op) => op,
                    None => break,
                },
            };

            {
                let mut stats = stats.write();
                stats.pending = stats.pending.saturating_sub(1);
                stats.processing += 1;
            }

            let label = op.to_string();
            let exec = Arc::clone(&executor);
            let started = Instant::now();
            let result = tokio::task::spawn_blocking(move || exec.execute(&op)).await;

            let mut stats_guard = stats.write();
            stats_guard.processing = stats_guard.processing.saturating_sub(1);
            match result {
                Ok(Ok(follow_ups)) => {
                    stats_guard.completed += 1;
                    debug!(
                        op = %label,
                        follow_ups = follow_ups.len(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Operation completed"
                    );
                    if !follow_ups.is_empty() {
                        // Everything already sent was queued before these.
                        while let Ok(queued) = rx.try_recv() {
                            backlog.push_back(queued);
                        }
                        stats_guard.pending += follow_ups.len();
                        backlog.extend(follow_ups);
                    }
                }
                Ok(Err(e)) => {
                    stats_guard.failed += 1;
                    error!(op = %label, error = %e, "Operation failed");
                }
                Err(e) => {
                    stats_guard.failed += 1;
                    warn!(op = %label, error = %e, "Operation panicked");
                }
            }
        }

        debug!("Operation worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records execution order; `CreateDir(p)` expands into two file creates.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Operation>>,
    }

    impl OperationExecutor for Recorder {
        fn execute(&self, op: &Operation) -> Result<Vec<Operation>, ApiError> {
            self.seen.lock().push(op.clone());
            match op {
                Operation::CreateDir(dir) => Ok(vec![
                    Operation::CreateFile(format!("{}/a.log", dir)),
                    Operation::CreateFile(format!("{}/b.log", dir)),
                ]),
                Operation::DeleteFile(p) if p == "bad.log" => {
                    Err(ApiError::PathNotIndexed(p.clone()))
                }
                Operation::DeleteFile(p) if p == "panic.log" => panic!("boom"),
                _ => Ok(Vec::new()),
            }
        }
    }

    #[tokio::test]
    async fn test_fifo_with_follow_ups_at_tail() {
        let recorder = Arc::new(Recorder::default());
        let queue = OperationQueue::start(recorder.clone());
        queue.enqueue(Operation::CreateDir("d".into())).unwrap();
        queue.enqueue(Operation::ChangeFile("x.log".into())).unwrap();
        queue.enqueue(Operation::ResetPendingCreate).unwrap();
        queue.wait_idle(Some(Duration::from_secs(5))).await.unwrap();

        assert_eq!(
            *recorder.seen.lock(),
            vec![
                Operation::CreateDir("d".into()),
                Operation::ChangeFile("x.log".into()),
                Operation::ResetPendingCreate,
                Operation::CreateFile("d/a.log".into()),
                Operation::CreateFile("d/b.log".into()),
            ]
        );
        let stats = queue.shutdown().await.unwrap();
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_poison_queue() {
        let recorder = Arc::new(Recorder::default());
        let queue = OperationQueue::start(recorder.clone());
        queue.enqueue(Operation::DeleteFile("bad.log".into())).unwrap();
        queue.enqueue(Operation::DeleteFile("panic.log".into())).unwrap();
        queue.enqueue(Operation::DeleteFile("ok.log".into())).unwrap();

        let stats = queue.shutdown().await.unwrap();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(recorder.seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_outstanding_senders() {
        let queue = OperationQueue::start(Arc::new(Recorder::default()));
        let sender = queue.sender().unwrap();
        let handle = tokio::spawn(queue.shutdown());
        // The worker keeps running while a sender is alive.
        sender.enqueue(Operation::ResetPendingCreate).unwrap();
        drop(sender);
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_operation_display() {
        let op = Operation::MoveFile {
            from: "a.log".into(),
            to: "b.log".into(),
        };
        assert_eq!(op.to_string(), "move-file a.log -> b.log");
    }
}
