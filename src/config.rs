//! Configuration
//!
//! Layered settings for tracking, watching, the build toolchain and logging.
//! See [`ConfigLoader`] for source precedence.

mod facade;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::tree::path::DEFAULT_TRACKED_EXTENSIONS;
use crate::tree::{ContentHasher, HashAlgorithm, TrackedExtensions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the reserved metadata directory inside a workspace.
pub const DEFAULT_META_DIR: &str = ".meta";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaSyncConfig {
    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub watch: WatchSettings,

    /// Toolchain recorded as build info on tracked artifacts; unset disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MetaSyncConfig {
    /// Check values that deserialize fine but can't be used.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.tracking.extensions.is_empty() {
            return Err(ApiError::ConfigError(
                "tracking.extensions must list at least one extension".to_string(),
            ));
        }
        let meta = &self.tracking.meta_dir;
        if meta.as_os_str().is_empty() || meta.is_absolute() || meta.components().count() != 1 {
            return Err(ApiError::ConfigError(format!(
                "tracking.meta_dir must be a single relative directory name, got {:?}",
                meta
            )));
        }
        if self.watch.tick_ms == 0 {
            return Err(ApiError::ConfigError("watch.tick_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Which files are tracked and how they are hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    #[serde(default = "default_meta_dir")]
    pub meta_dir: PathBuf,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_TRACKED_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_meta_dir() -> PathBuf {
    PathBuf::from(DEFAULT_META_DIR)
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            hash_algorithm: HashAlgorithm::default(),
            meta_dir: default_meta_dir(),
        }
    }
}

impl TrackingConfig {
    pub fn tracked_extensions(&self) -> TrackedExtensions {
        TrackedExtensions::new(&self.extensions)
    }

    pub fn hasher(&self) -> ContentHasher {
        ContentHasher::new(self.hash_algorithm)
    }
}

/// Watch mode timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSettings {
    /// How long a delete waits for a matching create before it is applied.
    /// Zero applies deletes immediately.
    #[serde(default = "default_rename_window_ms")]
    pub rename_window_ms: u64,

    /// Interval at which expired correlation windows are flushed.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_rename_window_ms() -> u64 {
    50
}

fn default_tick_ms() -> u64 {
    25
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            rename_window_ms: default_rename_window_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl WatchSettings {
    pub fn rename_window(&self) -> Duration {
        Duration::from_millis(self.rename_window_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Toolchain identity attached to build info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    pub name: String,
    pub version: String,
}
