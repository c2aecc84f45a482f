use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::{debug, warn};

use crate::error::Result;
use crate::settings::GridStoreConfig;

pub const DEFAULT_CONFIG_FILE: &str = "octofhir-grid.toml";
pub const ENV_PREFIX: &str = "OCTOFHIR";

/// Loads settings from an optional TOML file, then environment overrides
/// such as `OCTOFHIR__STORE__HISTORY_ENABLED=false`.
///
/// Without a path the default `octofhir-grid.toml` in the working directory
/// is used when present. List settings accept comma-separated values from
/// the environment.
pub fn load_config(path: Option<&Path>) -> Result<GridStoreConfig> {
    let mut builder = Config::builder();
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if file.exists() {
        debug!(path = %file.display(), "Loading configuration file");
        builder = builder.add_source(File::from(file));
    } else if path.is_some() {
        warn!(path = %file.display(), "Configuration file not found, using defaults");
    }

    // Environment variable overrides, e.g., OCTOFHIR__GRID__NAME=cluster-a
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("store.resource_types")
            .with_list_parse_key("store.history_disabled_types"),
    );

    let merged: GridStoreConfig = builder.build()?.try_deserialize()?;
    merged.validate()?;
    Ok(merged)
}
