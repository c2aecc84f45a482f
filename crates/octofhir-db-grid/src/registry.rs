use std::collections::BTreeMap;
use std::sync::Arc;

use octofhir_core::{CoreError, Result, SchemaContext};
use octofhir_grid::Grid;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::allocator::IdentifierAllocator;
use crate::store::{ResourceStore, StoreContext, StoreCounts, StoreOptions, TypeHistoryMode};
use crate::version::VersionOracle;

/// Which stores to open and how.
#[derive(Debug, Clone)]
pub struct StoreRegistryOptions {
    /// Resource types to serve. Empty means every resource type in the schema.
    pub resource_types: Vec<String>,
    pub history_enabled: bool,
    /// Types that never keep history, regardless of `history_enabled`.
    pub history_disabled_types: Vec<String>,
    pub type_history: TypeHistoryMode,
    /// Log every grid cache event at debug level.
    pub log_cache_events: bool,
}

impl Default for StoreRegistryOptions {
    fn default() -> Self {
        Self {
            resource_types: Vec::new(),
            history_enabled: true,
            history_disabled_types: Vec::new(),
            type_history: TypeHistoryMode::default(),
            log_cache_events: false,
        }
    }
}

impl StoreRegistryOptions {
    fn store_options(&self, resource_type: &str) -> StoreOptions {
        StoreOptions {
            history_enabled: self.history_enabled
                && !self.history_disabled_types.iter().any(|t| t == resource_type),
            type_history: self.type_history,
        }
    }
}

/// One [`ResourceStore`] per resource type, sharing an identifier allocator
/// and the process-wide version oracle.
pub struct StoreRegistry {
    ctx: StoreContext,
    stores: BTreeMap<String, Arc<ResourceStore>>,
    event_logger: Option<JoinHandle<()>>,
}

impl StoreRegistry {
    pub async fn open<G: Grid + 'static>(
        grid: Arc<G>,
        schema: Arc<SchemaContext>,
        options: StoreRegistryOptions,
    ) -> Result<Self> {
        Self::open_with_oracle(grid, schema, VersionOracle::global(), options).await
    }

    pub async fn open_with_oracle<G: Grid + 'static>(
        grid: Arc<G>,
        schema: Arc<SchemaContext>,
        oracle: Arc<VersionOracle>,
        options: StoreRegistryOptions,
    ) -> Result<Self> {
        if !grid.is_active() {
            return Err(CoreError::configuration(format!(
                "Grid '{}' is not available",
                grid.name()
            )));
        }

        let types: Vec<String> = if options.resource_types.is_empty() {
            schema.resource_types().into_iter().map(str::to_string).collect()
        } else {
            options.resource_types.clone()
        };

        let ctx = StoreContext {
            schema,
            allocator: Arc::new(IdentifierAllocator::new(grid.clone())),
            oracle,
        };

        let mut stores = BTreeMap::new();
        for resource_type in &types {
            let store = ResourceStore::open(
                grid.as_ref(),
                ctx.clone(),
                resource_type,
                options.store_options(resource_type),
            )
            .await?;
            stores.insert(resource_type.clone(), Arc::new(store));
        }

        // A failed open must leave no subscriber behind.
        let event_logger = options.log_cache_events.then(|| spawn_event_logger(grid.as_ref()));

        info!(grid = grid.name(), stores = stores.len(), "Store registry ready");
        Ok(Self {
            ctx,
            stores,
            event_logger,
        })
    }

    pub fn store(&self, resource_type: &str) -> Result<Arc<ResourceStore>> {
        self.stores.get(resource_type).cloned().ok_or_else(|| {
            CoreError::invalid_request(format!("No store for resource type {resource_type}"))
        })
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub fn stores(&self) -> impl Iterator<Item = &Arc<ResourceStore>> {
        self.stores.values()
    }

    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    /// Counters of every store, in resource type order.
    pub fn counts(&self) -> Vec<(String, StoreCounts)> {
        self.stores
            .iter()
            .map(|(rt, store)| (rt.clone(), store.counts()))
            .collect()
    }

    pub async fn clear_all(&self) -> Result<()> {
        for store in self.stores.values() {
            store.clear().await?;
        }
        Ok(())
    }
}

impl Drop for StoreRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.event_logger.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .field("log_cache_events", &self.event_logger.is_some())
            .finish()
    }
}

fn spawn_event_logger<G: Grid>(grid: &G) -> JoinHandle<()> {
    let mut events = grid.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(
                    map = %event.map_name,
                    kind = ?event.kind,
                    key = %event.key,
                    "Grid cache event"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Grid cache event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
