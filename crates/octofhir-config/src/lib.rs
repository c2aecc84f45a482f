//! Configuration for the OctoFHIR grid store.
//!
//! Settings come from an optional TOML file overlaid with `OCTOFHIR__`
//! environment variables, and are validated before use.

pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, Result};
pub use loader::{DEFAULT_CONFIG_FILE, load_config};
pub use settings::{GridSettings, GridStoreConfig, LoggingConfig, StoreSettings};
