//! Wiring from configuration to a running store registry.

use std::sync::Arc;

use anyhow::{Context, Result};
use octofhir_config::GridStoreConfig;
use octofhir_core::SchemaContext;
use octofhir_db_grid::{StoreRegistry, StoreRegistryOptions, TypeHistoryMode};
use octofhir_grid::{LocalGrid, LocalGridOptions};
use tracing::info;

pub struct App {
    pub schema: Arc<SchemaContext>,
    pub grid: Arc<LocalGrid>,
    pub registry: StoreRegistry,
}

pub fn registry_options(cfg: &GridStoreConfig) -> Result<StoreRegistryOptions> {
    let type_history: TypeHistoryMode = cfg
        .store
        .type_history
        .parse()
        .context("invalid store.type_history")?;
    Ok(StoreRegistryOptions {
        resource_types: cfg.store.resource_types.clone(),
        history_enabled: cfg.store.history_enabled,
        history_disabled_types: cfg.store.history_disabled_types.clone(),
        type_history,
        log_cache_events: cfg.store.log_cache_events,
    })
}

impl App {
    pub async fn start(cfg: &GridStoreConfig) -> Result<Self> {
        let schema = Arc::new(SchemaContext::r4());
        let grid = Arc::new(LocalGrid::with_options(
            cfg.grid.name.clone(),
            LocalGridOptions {
                event_buffer: cfg.grid.event_buffer,
                events_enabled: cfg.grid.events_enabled,
            },
        ));
        let registry = StoreRegistry::open(grid.clone(), schema.clone(), registry_options(cfg)?)
            .await
            .context("failed to open resource stores")?;
        info!(grid = %cfg.grid.name, "Grid store started");
        Ok(Self {
            schema,
            grid,
            registry,
        })
    }

    pub fn shutdown(self) {
        drop(self.registry);
        self.grid.close();
        info!("Grid store stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_options_from_config() {
        let mut cfg = GridStoreConfig::default();
        cfg.store.type_history = "Versions".into();
        cfg.store.history_disabled_types = vec!["Observation".into()];
        let options = registry_options(&cfg).unwrap();
        assert_eq!(options.type_history, TypeHistoryMode::Versions);
        assert_eq!(options.history_disabled_types, vec!["Observation"]);

        cfg.store.type_history = "sometimes".into();
        assert!(registry_options(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_start_limits_store_types() {
        let mut cfg = GridStoreConfig::default();
        cfg.store.resource_types = vec!["Patient".into()];
        let app = App::start(&cfg).await.unwrap();
        assert_eq!(app.registry.resource_types().collect::<Vec<_>>(), vec!["Patient"]);
        app.shutdown();
    }
}
