//! In-process grid backed by `DashMap`.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::config::MapConfig;
use crate::error::{GridError, GridResult};
use crate::events::{GridEventBroadcaster, GridEventKind};
use crate::grid::{AtomicCounter, Grid, GridKey, GridMap, GridValue, ScanFilter};

#[derive(Debug, Clone)]
pub struct LocalGridOptions {
    pub event_buffer: usize,
    /// When false, maps never publish events.
    pub events_enabled: bool,
}

impl Default for LocalGridOptions {
    fn default() -> Self {
        Self {
            event_buffer: 1024,
            events_enabled: true,
        }
    }
}

/// Liveness flag shared by the grid and everything it handed out.
#[derive(Debug, Clone)]
struct Liveness {
    grid_name: Arc<str>,
    active: Arc<AtomicBool>,
}

impl Liveness {
    fn check(&self) -> GridResult<()> {
        if self.active.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(GridError::Unavailable(self.grid_name.to_string()))
        }
    }
}

pub struct LocalGrid {
    liveness: Liveness,
    options: LocalGridOptions,
    maps: DashMap<String, Arc<dyn Any + Send + Sync>>,
    configs: DashMap<String, MapConfig>,
    counters: DashMap<String, Arc<LocalCounter>>,
    events: GridEventBroadcaster,
}

impl LocalGrid {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, LocalGridOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: LocalGridOptions) -> Self {
        let name: String = name.into();
        info!(grid = %name, events = options.events_enabled, "Starting local grid");
        Self {
            liveness: Liveness {
                grid_name: name.into(),
                active: Arc::new(AtomicBool::new(true)),
            },
            events: GridEventBroadcaster::with_capacity(options.event_buffer),
            options,
            maps: DashMap::new(),
            configs: DashMap::new(),
            counters: DashMap::new(),
        }
    }

    pub fn new_shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Stops the grid. Every later call on the grid, its maps and its
    /// counters fails with [`GridError::Unavailable`].
    pub fn close(&self) {
        if self.liveness.active.swap(false, Ordering::AcqRel) {
            info!(grid = %self.liveness.grid_name, "Local grid closed");
        }
    }

    pub fn map_config(&self, name: &str) -> Option<MapConfig> {
        self.configs.get(name).map(|c| c.clone())
    }

    pub fn map_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for LocalGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGrid")
            .field("name", &self.liveness.grid_name)
            .field("active", &self.is_active())
            .field("maps", &self.map_names())
            .finish()
    }
}

#[async_trait]
impl Grid for LocalGrid {
    fn name(&self) -> &str {
        &self.liveness.grid_name
    }

    fn is_active(&self) -> bool {
        self.liveness.check().is_ok()
    }

    fn get_or_create_map<K: GridKey, V: GridValue>(
        &self,
        config: &MapConfig,
    ) -> GridResult<Arc<dyn GridMap<K, V>>> {
        self.liveness.check()?;

        let erased = self
            .maps
            .entry(config.name.clone())
            .or_insert_with(|| {
                debug!(map = %config.name, backups = config.backups, "Creating grid map");
                self.configs.insert(config.name.clone(), config.clone());
                let events = self.options.events_enabled.then(|| self.events.clone());
                Arc::new(LocalMap::<K, V>::new(&config.name, self.liveness.clone(), events))
                    as Arc<dyn Any + Send + Sync>
            })
            .clone();

        let map = erased.downcast::<LocalMap<K, V>>().map_err(|_| {
            GridError::configuration(format!(
                "Map '{}' already exists with different key or value types",
                config.name
            ))
        })?;
        Ok(map as Arc<dyn GridMap<K, V>>)
    }

    async fn atomic_counter(
        &self,
        name: &str,
        initial: i64,
        create: bool,
    ) -> GridResult<Option<Arc<dyn AtomicCounter>>> {
        self.liveness.check()?;

        if let Some(counter) = self.counters.get(name) {
            return Ok(Some(counter.clone() as Arc<dyn AtomicCounter>));
        }
        if !create {
            return Ok(None);
        }

        let counter = self
            .counters
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(counter = %name, initial, "Creating atomic counter");
                Arc::new(LocalCounter {
                    name: name.to_string(),
                    value: AtomicI64::new(initial),
                    liveness: self.liveness.clone(),
                })
            })
            .clone();
        Ok(Some(counter as Arc<dyn AtomicCounter>))
    }

    fn events(&self) -> GridEventBroadcaster {
        self.events.clone()
    }
}

struct LocalMap<K: GridKey, V: GridValue> {
    name: String,
    data: DashMap<K, V>,
    liveness: Liveness,
    events: Option<GridEventBroadcaster>,
}

impl<K: GridKey, V: GridValue> LocalMap<K, V> {
    fn new(name: &str, liveness: Liveness, events: Option<GridEventBroadcaster>) -> Self {
        Self {
            name: name.to_string(),
            data: DashMap::new(),
            liveness,
            events,
        }
    }

    fn publish(&self, kind: GridEventKind, key: Option<&K>) {
        if let Some(events) = &self.events {
            events.publish(&self.name, kind, || {
                key.map(|k| format!("{k:?}")).unwrap_or_default()
            });
        }
    }
}

#[async_trait]
impl<K: GridKey, V: GridValue> GridMap<K, V> for LocalMap<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &K) -> GridResult<Option<V>> {
        self.liveness.check()?;
        let value = self.data.get(key).map(|v| v.value().clone());
        if value.is_some() {
            self.publish(GridEventKind::Read, Some(key));
        }
        Ok(value)
    }

    async fn put(&self, key: K, value: V) -> GridResult<()> {
        self.liveness.check()?;
        self.publish(GridEventKind::Put, Some(&key));
        self.data.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &K) -> GridResult<bool> {
        self.liveness.check()?;
        let removed = self.data.remove(key).is_some();
        if removed {
            self.publish(GridEventKind::Removed, Some(key));
        }
        Ok(removed)
    }

    async fn contains_key(&self, key: &K) -> GridResult<bool> {
        self.liveness.check()?;
        Ok(self.data.contains_key(key))
    }

    async fn clear(&self) -> GridResult<()> {
        self.liveness.check()?;
        self.data.clear();
        self.publish(GridEventKind::Cleared, None);
        Ok(())
    }

    async fn scan(&self, filter: Option<&ScanFilter<K, V>>) -> GridResult<Vec<(K, V)>> {
        self.liveness.check()?;
        let entries = self
            .data
            .iter()
            .filter(|entry| filter.is_none_or(|f| f(entry.key(), entry.value())))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        Ok(entries)
    }

    async fn size(&self) -> GridResult<usize> {
        self.liveness.check()?;
        Ok(self.data.len())
    }
}

struct LocalCounter {
    name: String,
    value: AtomicI64,
    liveness: Liveness,
}

#[async_trait]
impl AtomicCounter for LocalCounter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn increment_and_get(&self) -> GridResult<i64> {
        self.liveness.check()?;
        Ok(self.value.fetch_add(1, Ordering::AcqRel) + 1)
    }

    async fn get(&self) -> GridResult<i64> {
        self.liveness.check()?;
        Ok(self.value.load(Ordering::Acquire))
    }
}
