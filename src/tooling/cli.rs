//! CLI Tooling
//!
//! Command-line interface for metasync. Every command opens the workspace,
//! which rescans the tree and reconciles the stored metadata before the
//! command itself runs.

use crate::config::{ConfigLoader, MetaSyncConfig};
use crate::error::{ApiError, StorageError};
use crate::logging::{LogFormat, LogOutput, LoggingConfig};
use crate::types::ContentHash;
use crate::workspace::format::{
    format_entry_text, format_object_text, format_reconcile_report_text, format_relation_text,
    format_workspace_status_text,
};
use crate::workspace::{WatchDaemon, Workspace};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// metasync - metadata that follows files by content
#[derive(Parser)]
#[command(name = "metasync")]
#[command(about = "Keep per-file metadata in sync with a workspace, keyed by content hash")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log destination
    #[arg(long, value_enum)]
    pub log_output: Option<LogOutput>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply the command-line logging flags on top of the configured settings.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut logging = base.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            logging.format = format;
        }
        if let Some(output) = self.log_output {
            logging.output = output;
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

/// Output format for query commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rescan the workspace and reconcile stored metadata
    Scan {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show index and metadata store counts
    Status {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show the metadata entry of a file
    Show {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show the metadata object stored for a content hash
    Object {
        hash: String,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show the relation graph around a file's content
    Relation {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Record that CHILD was built from PARENT
    Link { child: PathBuf, parent: PathBuf },
    /// Watch the workspace and keep metadata in sync until interrupted
    Watch,
    /// Print the effective configuration
    Config,
}

/// CLI context: workspace root and resolved configuration.
pub struct CliContext {
    workspace_root: PathBuf,
    config: MetaSyncConfig,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::resolve(&workspace_root, config_path.as_deref())?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &MetaSyncConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    fn open(&self) -> Result<Workspace, ApiError> {
        Workspace::open(&self.workspace_root, self.config.clone())
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Scan { format } => {
                let ws = self.open()?;
                let report = ws.startup_report();
                match format {
                    OutputFormat::Json => to_json(report),
                    OutputFormat::Text => Ok(format_reconcile_report_text(report)),
                }
            }
            Commands::Status { format } => {
                let status = self.open()?.status()?;
                match format {
                    OutputFormat::Json => to_json(&status),
                    OutputFormat::Text => Ok(format_workspace_status_text(&status)),
                }
            }
            Commands::Show { path, format } => {
                let ws = self.open()?;
                let key = ws.key_for(path)?;
                let view = ws.entry(&key)?.ok_or(ApiError::PathNotIndexed(key))?;
                match format {
                    OutputFormat::Json => to_json(&view),
                    OutputFormat::Text => Ok(format_entry_text(&view)),
                }
            }
            Commands::Object { hash, format } => {
                let hash = ContentHash::parse(hash)?;
                let object = self.open()?.object(&hash)?;
                match format {
                    OutputFormat::Json => to_json(&object),
                    OutputFormat::Text => Ok(format_object_text(&hash, &object)),
                }
            }
            Commands::Relation { path, format } => {
                let ws = self.open()?;
                let key = ws.key_for(path)?;
                let info = ws.relation(&key)?.ok_or(ApiError::PathNotIndexed(key))?;
                match format {
                    OutputFormat::Json => to_json(&info),
                    OutputFormat::Text => Ok(format_relation_text(&info)),
                }
            }
            Commands::Link { child, parent } => {
                let ws = self.open()?;
                let child = ws.key_for(child)?;
                let parent = ws.key_for(parent)?;
                if ws.link(&child, &parent)? {
                    Ok(format!("Linked {} -> {}", parent, child))
                } else {
                    Ok(format!("{} is already linked to {}", child, parent))
                }
            }
            Commands::Watch => self.watch(),
            Commands::Config => toml::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
        }
    }

    fn watch(&self) -> Result<String, ApiError> {
        let ws = self.open()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::WatchError(format!("Failed to start async runtime: {}", e)))?;

        info!("Starting watch mode daemon");
        let daemon = WatchDaemon::new(ws);
        let stats = runtime.block_on(daemon.run())?;
        Ok(format!(
            "Watch stopped: {} operations completed, {} failed",
            stats.completed, stats.failed
        ))
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(|e| ApiError::Storage(StorageError::Serialize(e)))
}
