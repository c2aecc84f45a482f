use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

const TYPE_HISTORY_MODES: &[&str] = &["current", "versions"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GridStoreConfig {
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GridStoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid.name.trim().is_empty() {
            return Err(ConfigError::validation("grid.name must not be empty"));
        }
        if self.grid.event_buffer == 0 {
            return Err(ConfigError::validation("grid.event_buffer must be > 0"));
        }
        if !TYPE_HISTORY_MODES.contains(&self.store.type_history.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::validation(format!(
                "store.type_history must be one of {TYPE_HISTORY_MODES:?}, got '{}'",
                self.store.type_history
            )));
        }
        let blank = |types: &[String]| types.iter().any(|t| t.trim().is_empty());
        if blank(&self.store.resource_types) {
            return Err(ConfigError::validation(
                "store.resource_types must not contain empty names",
            ));
        }
        if blank(&self.store.history_disabled_types) {
            return Err(ConfigError::validation(
                "store.history_disabled_types must not contain empty names",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::validation("logging.level must not be empty"));
        }
        Ok(())
    }
}

/// The grid the store runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    #[serde(default = "default_grid_name")]
    pub name: String,
    /// Capacity of the cache event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_true")]
    pub events_enabled: bool,
}

fn default_grid_name() -> String {
    "octofhir".into()
}
fn default_event_buffer() -> usize {
    1024
}
fn default_true() -> bool {
    true
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            name: default_grid_name(),
            event_buffer: default_event_buffer(),
            events_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Resource types to open stores for. Empty means all known types.
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default = "default_true")]
    pub history_enabled: bool,
    #[serde(default)]
    pub history_disabled_types: Vec<String>,
    /// `current` or `versions`.
    #[serde(default = "default_type_history")]
    pub type_history: String,
    #[serde(default)]
    pub log_cache_events: bool,
}

fn default_type_history() -> String {
    "current".into()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            resource_types: Vec::new(),
            history_enabled: true,
            history_disabled_types: Vec::new(),
            type_history: default_type_history(),
            log_cache_events: false,
        }
    }
}

impl StoreSettings {
    /// Whether `resource_type` keeps version history.
    pub fn history_enabled_for(&self, resource_type: &str) -> bool {
        self.history_enabled && !self.history_disabled_types.iter().any(|t| t == resource_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = GridStoreConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.grid.name, "octofhir");
        assert!(cfg.store.history_enabled);
        assert_eq!(cfg.store.type_history, "current");
    }

    #[test]
    fn test_validation_messages() {
        let mut cfg = GridStoreConfig::default();
        cfg.grid.event_buffer = 0;
        assert_eq!(
            cfg.validate().unwrap_err().to_string(),
            "Validation error: grid.event_buffer must be > 0"
        );

        let mut cfg = GridStoreConfig::default();
        cfg.store.type_history = "all".into();
        assert!(cfg.validate().unwrap_err().to_string().contains("store.type_history"));

        let mut cfg = GridStoreConfig::default();
        cfg.store.resource_types = vec!["Patient".into(), " ".into()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_history_per_type() {
        let store = StoreSettings {
            history_disabled_types: vec!["AuditEvent".into()],
            ..Default::default()
        };
        assert!(store.history_enabled_for("Patient"));
        assert!(!store.history_enabled_for("AuditEvent"));
    }

    #[test]
    fn test_parses_from_toml() {
        let cfg: GridStoreConfig = toml::from_str(
            r#"
[store]
resource_types = ["Patient"]
type_history = "versions"
"#,
        )
        .unwrap();
        assert_eq!(cfg.store.resource_types, vec!["Patient"]);
        assert_eq!(cfg.store.type_history, "versions");
        assert_eq!(cfg.grid.event_buffer, 1024);
    }
}
