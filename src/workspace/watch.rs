//! Watch runtime: events, routing, the operation queue, and the daemon.

pub mod events;
pub mod queue;
pub mod router;
mod runtime;

pub use events::{FileEvent, RenameAssembler};
pub use queue::{Operation, OperationExecutor, OperationQueue, OperationSender, QueueStats};
pub use router::{FileEventRouter, PendingCreate};
pub use runtime::{StopHandle, WatchDaemon};
