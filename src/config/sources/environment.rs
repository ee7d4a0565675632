//! Environment variable source: METASYNC__* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const ENV_PREFIX: &str = "METASYNC";

/// Add environment variable overlay to builder.
///
/// `METASYNC__WATCH__RENAME_WINDOW_MS=0` sets `watch.rename_window_ms`;
/// `METASYNC__TRACKING__EXTENSIONS=.log,.circle` is read as a list.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(source()))
}

fn source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("tracking.extensions")
}
