//! Workspace domain: owning context, lifecycle operations, status formatting, and watch runtime.

mod context;
pub mod format;
mod lifecycle;
mod types;
pub mod watch;

pub use context::Workspace;
pub use lifecycle::MetadataLifecycle;
pub use types::{EntryView, WorkspaceStatus};
pub use watch::WatchDaemon;
