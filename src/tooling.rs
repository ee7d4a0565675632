//! Tooling & Integration Layer
//!
//! Command-line surface over an open workspace.

pub mod cli;

pub use cli::{Cli, CliContext, Commands, OutputFormat};
pub use crate::workspace::WatchDaemon;
