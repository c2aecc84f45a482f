//! Substrate traits: maps, counters and the grid that hands them out.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MapConfig;
use crate::error::GridResult;
use crate::events::GridEventBroadcaster;

/// Bound for map keys.
pub trait GridKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> GridKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Bound for map values.
pub trait GridValue: Clone + Send + Sync + 'static {}

impl<T> GridValue for T where T: Clone + Send + Sync + 'static {}

/// Predicate applied to each entry during a scan.
pub type ScanFilter<K, V> = dyn Fn(&K, &V) -> bool + Send + Sync;

/// A named key-value map. Each single-key operation is atomic.
#[async_trait]
pub trait GridMap<K: GridKey, V: GridValue>: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &K) -> GridResult<Option<V>>;

    async fn put(&self, key: K, value: V) -> GridResult<()>;

    /// Returns whether an entry was removed.
    async fn remove(&self, key: &K) -> GridResult<bool>;

    async fn contains_key(&self, key: &K) -> GridResult<bool>;

    async fn clear(&self) -> GridResult<()>;

    /// Entries matching `filter`, or all entries. Order is unspecified.
    async fn scan(&self, filter: Option<&ScanFilter<K, V>>) -> GridResult<Vec<(K, V)>>;

    async fn size(&self) -> GridResult<usize>;
}

/// A named cluster-wide counter.
#[async_trait]
pub trait AtomicCounter: Send + Sync {
    fn name(&self) -> &str;

    async fn increment_and_get(&self) -> GridResult<i64>;

    async fn get(&self) -> GridResult<i64>;
}

#[async_trait]
pub trait Grid: Send + Sync {
    fn name(&self) -> &str;

    fn is_active(&self) -> bool;

    /// Returns the map named by `config`, creating it on first use. Asking
    /// for an existing map with different key or value types fails.
    fn get_or_create_map<K: GridKey, V: GridValue>(
        &self,
        config: &MapConfig,
    ) -> GridResult<Arc<dyn GridMap<K, V>>>
    where
        Self: Sized;

    /// Returns the counter `name`. When it does not exist it is created at
    /// `initial` if `create` is set, otherwise `None` is returned.
    async fn atomic_counter(
        &self,
        name: &str,
        initial: i64,
        create: bool,
    ) -> GridResult<Option<Arc<dyn AtomicCounter>>>;

    fn events(&self) -> GridEventBroadcaster;
}
