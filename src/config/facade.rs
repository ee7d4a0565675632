//! ConfigLoader facade composing the configuration sources.

use super::sources::{environment, files};
use super::MetaSyncConfig;
use crate::error::ApiError;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder};
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence: defaults (lowest) -> global file -> workspace file -> environment (highest).
    pub fn load(workspace_root: &Path) -> Result<MetaSyncConfig, ApiError> {
        let builder = Self::builder_with_defaults()?;
        let builder = files::add_global(builder)?;
        let builder = files::add_workspace(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder)?;
        Self::finish(builder)
    }

    /// Load configuration from a specific file with environment overlay.
    ///
    /// The global and workspace files are not consulted.
    pub fn load_from_file(path: &Path) -> Result<MetaSyncConfig, ApiError> {
        let builder = Self::builder_with_defaults()?;
        let builder = files::add_explicit(builder, path)?;
        let builder = environment::add_to_builder(builder)?;
        Self::finish(builder)
    }

    /// Explicit file when given, otherwise the standard workspace layering.
    pub fn resolve(workspace_root: &Path, explicit: Option<&Path>) -> Result<MetaSyncConfig, ApiError> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => Self::load(workspace_root),
        }
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ApiError> {
        let defaults = Config::try_from(&MetaSyncConfig::default())?;
        Ok(Config::builder().add_source(defaults))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<MetaSyncConfig, ApiError> {
        let config: MetaSyncConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
