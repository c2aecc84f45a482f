//! Versioned resource store for one resource type.
//!
//! Layout on the grid:
//!
//! - `<Type>`: logical id -> encoded latest version
//! - `<Type>_History`: (id, version) -> encoded version, or an encoded null
//!   for a deletion (tombstone)
//!
//! In memory the store keeps, per logical id, the most-recent-first list of
//! its versions behind a `tokio::sync::Mutex`. That mutex is the critical
//! section of every write: the version stamp is taken while holding it, so
//! the list order, the history map and `current` always agree on which
//! version is the newest.

use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use octofhir_codec::{FhirBinaryCodec, RecordValue, from_bytes, record_to_bytes, to_bytes};
use octofhir_core::interceptor::{
    HookParams, Pointcut, PreResourceAccessDetails, PreResourceShowDetails, StorageChange,
};
use octofhir_core::model::{Base, Primitive, SchemaContext};
use octofhir_core::{
    CoreError, IdType, RequestDetails, Resource, Result, TransactionDetails, validate_id,
};
use octofhir_grid::{Grid, GridMap, MapConfig, ScanFilter};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::allocator::IdentifierAllocator;
use crate::cache_config::{cache_configuration_for, history_cache_configuration_for};
use crate::key::VersionedKey;
use crate::version::VersionOracle;

const META_CHILD: &str = "meta";
const VERSION_ID_CHILD: &str = "versionId";

/// What `history_for_type` resolves its entries against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeHistoryMode {
    /// Each identity once, as its current value. Deleted identities drop out.
    #[default]
    Current,
    /// Every stored version from the history map, deletions excluded.
    Versions,
}

impl FromStr for TypeHistoryMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "current" => Ok(TypeHistoryMode::Current),
            "versions" => Ok(TypeHistoryMode::Versions),
            other => Err(CoreError::configuration(format!(
                "Unknown type history mode '{other}' (expected 'current' or 'versions')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Keep every version in `<Type>_History`.
    pub history_enabled: bool,
    pub type_history: TypeHistoryMode,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            history_enabled: true,
            type_history: TypeHistoryMode::default(),
        }
    }
}

/// Collaborators shared by every store of a registry.
#[derive(Clone)]
pub struct StoreContext {
    pub schema: Arc<SchemaContext>,
    pub allocator: Arc<IdentifierAllocator>,
    pub oracle: Arc<VersionOracle>,
}

/// Result of a write.
#[derive(Debug, Clone)]
pub struct MethodOutcome {
    pub id: IdType,
    /// Set by create and update: whether this write created the identity.
    pub created: Option<bool>,
    /// The stored resource, as written after hooks ran.
    pub resource: Option<Resource>,
}

/// Snapshot of the operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub create: u64,
    pub read: u64,
    pub update: u64,
    pub delete: u64,
    pub search: u64,
}

#[derive(Debug, Default)]
struct StoreCounters {
    create: AtomicU64,
    read: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
    search: AtomicU64,
}

impl StoreCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StoreCounts {
        StoreCounts {
            create: self.create.load(Ordering::Relaxed),
            read: self.read.load(Ordering::Relaxed),
            update: self.update.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
            search: self.search.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [&self.create, &self.read, &self.update, &self.delete, &self.search] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

type VersionList = Arc<Mutex<VecDeque<VersionedKey>>>;

pub struct ResourceStore {
    resource_type: String,
    ctx: StoreContext,
    codec: FhirBinaryCodec,
    options: StoreOptions,
    current_config: MapConfig,
    history_config: Option<MapConfig>,
    current: Arc<dyn GridMap<String, Vec<u8>>>,
    history: Option<Arc<dyn GridMap<VersionedKey, Vec<u8>>>>,
    history_index: DashMap<String, VersionList>,
    type_history: RwLock<VecDeque<VersionedKey>>,
    counters: StoreCounters,
}

impl ResourceStore {
    /// Opens (creating if needed) the maps for `resource_type` and rebuilds
    /// the in-memory indexes from whatever the grid already holds.
    pub async fn open<G: Grid>(
        grid: &G,
        ctx: StoreContext,
        resource_type: &str,
        options: StoreOptions,
    ) -> Result<Self> {
        let current_config = cache_configuration_for(&ctx.schema, resource_type)?;
        let current = grid.get_or_create_map::<String, Vec<u8>>(&current_config)?;

        let (history_config, history) = if options.history_enabled {
            let config = history_cache_configuration_for(&ctx.schema, resource_type)?;
            let map = grid.get_or_create_map::<VersionedKey, Vec<u8>>(&config)?;
            (Some(config), Some(map))
        } else {
            (None, None)
        };

        let store = Self {
            resource_type: resource_type.to_string(),
            ctx,
            codec: FhirBinaryCodec::new(),
            options,
            current_config,
            history_config,
            current,
            history,
            history_index: DashMap::new(),
            type_history: RwLock::new(VecDeque::new()),
            counters: StoreCounters::default(),
        };

        let rebuilt = store.rebuild_indexes().await?;
        info!(
            resource_type = %store.resource_type,
            history = store.history.is_some(),
            versions = rebuilt,
            "Resource store opened"
        );
        Ok(store)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Map declarations: the current map and, when history is kept, the history map.
    pub fn cache_config(&self) -> (&MapConfig, Option<&MapConfig>) {
        (&self.current_config, self.history_config.as_ref())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Stores a new resource. A resource without a logical id gets one from
    /// the identifier allocator.
    pub async fn create(
        &self,
        resource: Resource,
        request: Option<&RequestDetails>,
    ) -> Result<MethodOutcome> {
        let outcome = self.create_resource(resource, request).await?;
        StoreCounters::bump(&self.counters.create);
        Ok(outcome)
    }

    async fn create_resource(
        &self,
        mut resource: Resource,
        request: Option<&RequestDetails>,
    ) -> Result<MethodOutcome> {
        self.check_resource_type(resource.resource_type())?;

        let id_part = match resource.id_element().id_part() {
            Some(id) => {
                validate_id(id)?;
                id.to_string()
            }
            None => self.ctx.allocator.next_id(&self.resource_type).await?,
        };
        resource.set_id(&IdType::new(&self.resource_type, &id_part, None));

        let stored = self.store(resource, &id_part, None, request).await?;
        Ok(MethodOutcome {
            id: stored.id,
            created: Some(true),
            resource: Some(stored.resource),
        })
    }

    /// Stores a new version of an identity chosen by the caller.
    ///
    /// `created` in the outcome tells whether no prior value existed: the
    /// addressed version in history when the id carries a version, else the
    /// current value.
    pub async fn update(
        &self,
        resource: Resource,
        conditional_url: Option<&str>,
        request: Option<&RequestDetails>,
    ) -> Result<MethodOutcome> {
        if conditional_url.is_some_and(|url| !url.trim().is_empty()) {
            return Err(CoreError::invalid_request(
                "This server doesn't support conditional update",
            ));
        }
        let outcome = self.update_resource(resource, request).await?;
        StoreCounters::bump(&self.counters.update);
        Ok(outcome)
    }

    async fn update_resource(
        &self,
        resource: Resource,
        request: Option<&RequestDetails>,
    ) -> Result<MethodOutcome> {
        self.check_resource_type(resource.resource_type())?;

        let id = resource.id_element();
        let id_part = id
            .id_part()
            .ok_or_else(|| CoreError::invalid_request("Update requires a resource id"))?
            .to_string();
        validate_id(&id_part)?;
        let addressed = if id.has_version_id_part() {
            Some(VersionedKey::try_from(&id)?)
        } else {
            None
        };

        let stored = self.store(resource, &id_part, addressed, request).await?;
        Ok(MethodOutcome {
            id: stored.id,
            created: Some(stored.created),
            resource: Some(stored.resource),
        })
    }

    /// Deletes an identity, or one version of it, and records the deletion
    /// as a new version.
    ///
    /// A version-qualified delete removes that history entry; if it is also
    /// the current value, the current value goes too. An unqualified delete
    /// removes the current value.
    pub async fn delete(&self, id: &IdType, request: Option<&RequestDetails>) -> Result<MethodOutcome> {
        self.check_id_type(id)?;

        let id_part = id
            .id_part()
            .ok_or_else(|| CoreError::invalid_request("Delete requires a resource id"))?;
        let versions = self
            .versions_of(id_part)
            .ok_or_else(|| CoreError::resource_not_found(&self.resource_type, id_part))?;
        let mut versions = versions.lock().await;
        if versions.is_empty() {
            return Err(CoreError::resource_not_found(&self.resource_type, id_part));
        }

        let addressed = if id.has_version_id_part() {
            Some(VersionedKey::try_from(id)?)
        } else {
            None
        };

        let old = match &addressed {
            Some(key) => Some(
                self.read_version_entry(key)
                    .await?
                    .ok_or_else(|| CoreError::resource_not_found(&self.resource_type, id.value()))?,
            ),
            None => self.read_current(id_part).await?,
        };

        let tombstone = VersionedKey::new(id_part, self.ctx.oracle.next_version());
        self.fire_storage_hooks(StorageChange::Deleted, old, None, request)
            .await?;

        match &addressed {
            Some(key) => {
                if let Some(history) = &self.history {
                    history.remove(key).await?;
                }
                if self.current_version(id_part).await? == Some(key.version()) {
                    self.current.remove(&id_part.to_string()).await?;
                }
            }
            None => {
                self.current.remove(&id_part.to_string()).await?;
            }
        }

        if let Some(history) = &self.history {
            history.put(tombstone.clone(), to_bytes(&RecordValue::Null)?).await?;
        }
        versions.push_front(tombstone.clone());
        self.record_type_history(tombstone.clone()).await;
        StoreCounters::bump(&self.counters.delete);

        info!(
            resource_type = %self.resource_type,
            id = %id_part,
            version = tombstone.version(),
            "Resource deleted"
        );
        Ok(MethodOutcome {
            id: tombstone.to_id(&self.resource_type),
            created: None,
            resource: None,
        })
    }

    /// Stores a resource without firing interceptors: update when it has an
    /// id, create otherwise. Used by imports and tooling; not counted.
    pub async fn store_resource(&self, resource: Resource) -> Result<MethodOutcome> {
        if resource.id_element().has_id_part() {
            self.update_resource(resource, None).await
        } else {
            self.create_resource(resource, None).await
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Reads the current value, or a specific version when the id carries one.
    pub async fn read(&self, id: &IdType, request: Option<&RequestDetails>) -> Result<Resource> {
        self.check_id_type(id)?;

        let id_part = id
            .id_part()
            .ok_or_else(|| CoreError::invalid_request("Read requires a resource id"))?;

        let resource = if id.has_version_id_part() {
            let key = VersionedKey::try_from(id)?;
            match self.read_version_entry(&key).await? {
                Some(resource) => resource,
                None if self.is_known(id_part).await => {
                    return Err(CoreError::resource_gone(&self.resource_type, id.value()));
                }
                None => return Err(CoreError::resource_not_found(&self.resource_type, id.value())),
            }
        } else {
            self.read_current(id_part)
                .await?
                .ok_or_else(|| CoreError::resource_not_found(&self.resource_type, id_part))?
        };

        let shown = self
            .filter_for_access(vec![resource], request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::resource_not_found(&self.resource_type, id_part))?;
        StoreCounters::bump(&self.counters.read);
        Ok(shown)
    }

    /// All retained versions of one identity, most recent first. Deletions
    /// and purged versions are skipped.
    pub async fn history_for_id(
        &self,
        id_part: &str,
        request: Option<&RequestDetails>,
    ) -> Result<Vec<Resource>> {
        let keys: Vec<VersionedKey> = match self.versions_of(id_part) {
            Some(list) => list.lock().await.iter().cloned().collect(),
            None => return Err(CoreError::resource_not_found(&self.resource_type, id_part)),
        };
        if keys.is_empty() {
            return Err(CoreError::resource_not_found(&self.resource_type, id_part));
        }
        let Some(history) = &self.history else {
            return Ok(Vec::new());
        };

        let mut resources = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(bytes) = history.get(key).await? {
                if let Some(resource) = self.decode_or_skip(&bytes, &key.to_string()) {
                    resources.push(resource);
                }
            }
        }
        self.filter_for_access(resources, request).await
    }

    /// Type-level history, most recent first. See [`TypeHistoryMode`].
    pub async fn history_for_type(&self, request: Option<&RequestDetails>) -> Result<Vec<Resource>> {
        let keys: Vec<VersionedKey> = self.type_history.read().await.iter().cloned().collect();
        let mut resources = Vec::new();

        match (self.options.type_history, &self.history) {
            (TypeHistoryMode::Versions, Some(history)) => {
                for key in &keys {
                    if let Some(bytes) = history.get(key).await? {
                        if let Some(resource) = self.decode_or_skip(&bytes, &key.to_string()) {
                            resources.push(resource);
                        }
                    }
                }
            }
            _ => {
                let mut seen = HashSet::new();
                for key in &keys {
                    if !seen.insert(key.id_part()) {
                        continue;
                    }
                    if let Some(bytes) = self.current.get(&key.id_part().to_string()).await? {
                        if let Some(resource) = self.decode_or_skip(&bytes, key.id_part()) {
                            resources.push(resource);
                        }
                    }
                }
            }
        }
        self.filter_for_access(resources, request).await
    }

    pub async fn search_all(&self, request: Option<&RequestDetails>) -> Result<Vec<Resource>> {
        self.search_by_predicate(|_| true, request).await
    }

    /// Current values matching `predicate`, ordered by logical id.
    pub async fn search_by_predicate<P>(
        &self,
        predicate: P,
        request: Option<&RequestDetails>,
    ) -> Result<Vec<Resource>>
    where
        P: Fn(&Resource) -> bool + Send + Sync,
    {
        StoreCounters::bump(&self.counters.search);
        let entries = self.current.scan(None).await?;
        let resources = self.decode_entries(entries).into_iter().filter(|r| predicate(r)).collect();
        self.filter_for_access(resources, request).await
    }

    /// `_id` search: each inner list is an OR of ids, the lists are ANDed.
    /// No lists means no constraint.
    pub async fn search_by_ids(
        &self,
        and_groups: &[Vec<String>],
        request: Option<&RequestDetails>,
    ) -> Result<Vec<Resource>> {
        if and_groups.is_empty() {
            return self.search_all(request).await;
        }
        StoreCounters::bump(&self.counters.search);

        let mut allowed: HashSet<String> = and_groups[0].iter().cloned().collect();
        for group in &and_groups[1..] {
            allowed.retain(|id| group.contains(id));
        }
        if allowed.is_empty() {
            return Ok(Vec::new());
        }

        let filter = move |id: &String, _: &Vec<u8>| allowed.contains(id);
        let entries = self.current.scan(Some(&filter as &ScanFilter<String, Vec<u8>>)).await?;
        let resources = self.decode_entries(entries);
        self.filter_for_access(resources, request).await
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Wipes both maps and the in-memory indexes.
    pub async fn clear(&self) -> Result<()> {
        self.current.clear().await?;
        if let Some(history) = &self.history {
            history.clear().await?;
        }
        self.history_index.clear();
        self.type_history.write().await.clear();
        info!(resource_type = %self.resource_type, "Resource store cleared");
        Ok(())
    }

    pub fn clear_counts(&self) {
        self.counters.reset();
    }

    pub fn counts(&self) -> StoreCounts {
        self.counters.snapshot()
    }

    pub fn count_create(&self) -> u64 {
        self.counters.create.load(Ordering::Relaxed)
    }

    pub fn count_read(&self) -> u64 {
        self.counters.read.load(Ordering::Relaxed)
    }

    pub fn count_update(&self) -> u64 {
        self.counters.update.load(Ordering::Relaxed)
    }

    pub fn count_delete(&self) -> u64 {
        self.counters.delete.load(Ordering::Relaxed)
    }

    pub fn count_search(&self) -> u64 {
        self.counters.search.load(Ordering::Relaxed)
    }

    /// Number of identities with at least one recorded version.
    pub fn identity_count(&self) -> usize {
        self.history_index.len()
    }

    /// Rebuilds the version lists and the type history from the grid.
    ///
    /// The history map is authoritative when kept; otherwise the versions
    /// stamped on the current values are used. The version oracle is moved
    /// past the highest version found. Returns the number of versions indexed.
    pub async fn rebuild_indexes(&self) -> Result<usize> {
        let mut keys: Vec<VersionedKey> = match &self.history {
            Some(history) => history.scan(None).await?.into_iter().map(|(k, _)| k).collect(),
            None => self
                .decode_entries(self.current.scan(None).await?)
                .iter()
                .filter_map(|r| VersionedKey::try_from(&r.id_element()).ok())
                .collect(),
        };
        keys.sort_unstable_by(|a, b| b.version().cmp(&a.version()).then_with(|| a.cmp(b)));

        let mut lists: HashMap<String, VecDeque<VersionedKey>> = HashMap::new();
        for key in &keys {
            lists
                .entry(key.id_part().to_string())
                .or_default()
                .push_back(key.clone());
        }
        self.history_index.clear();
        for (id_part, list) in lists {
            self.history_index.insert(id_part, Arc::new(Mutex::new(list)));
        }

        if let Some(max) = keys.first() {
            self.ctx.oracle.observe(max.version());
        }
        let count = keys.len();
        *self.type_history.write().await = keys.into();
        debug!(resource_type = %self.resource_type, versions = count, "Indexes rebuilt");
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// The write path shared by create and update.
    async fn store(
        &self,
        resource: Resource,
        id_part: &str,
        addressed: Option<VersionedKey>,
        request: Option<&RequestDetails>,
    ) -> Result<Stored> {
        let list = self
            .history_index
            .entry(id_part.to_string())
            .or_default()
            .clone();
        let mut versions = list.lock().await;
        let result = self
            .store_locked(&mut versions, resource, id_part, addressed, request)
            .await;
        drop(versions);

        // A failed first write must not leave an identity behind.
        if result.is_err() {
            self.history_index.remove_if(id_part, |_, existing| {
                Arc::ptr_eq(existing, &list)
                    && Arc::strong_count(&list) == 2
                    && existing.try_lock().is_ok_and(|l| l.is_empty())
            });
        }
        result
    }

    async fn store_locked(
        &self,
        versions: &mut VecDeque<VersionedKey>,
        mut resource: Resource,
        id_part: &str,
        addressed: Option<VersionedKey>,
        request: Option<&RequestDetails>,
    ) -> Result<Stored> {
        let created = match &addressed {
            Some(key) => match &self.history {
                Some(history) => !history.contains_key(key).await?,
                None => !versions.contains(key),
            },
            None => !self.current.contains_key(&id_part.to_string()).await?,
        };

        let key = VersionedKey::new(id_part, self.ctx.oracle.next_version());
        let id = key.to_id(&self.resource_type);
        resource.set_id(&id);
        self.stamp_meta(&mut resource, key.version());

        let change = if versions.is_empty() {
            StorageChange::Created
        } else {
            StorageChange::Updated
        };
        let old = match versions.front() {
            Some(previous) => self.read_version_entry(previous).await?,
            None => None,
        };
        let old = match old {
            Some(old) => Some(old),
            None => self.read_current(id_part).await?,
        };

        let mut resource = self
            .fire_storage_hooks(change, old, Some(resource.clone()), request)
            .await?
            .unwrap_or(resource);
        // Hooks may edit the resource but not its identity.
        resource.set_id(&id);

        let record = self.codec.encode_resource(&self.ctx.schema, &resource)?;
        let bytes = record_to_bytes(&record)?;
        if let Some(history) = &self.history {
            history.put(key.clone(), bytes.clone()).await?;
        }
        self.current.put(id_part.to_string(), bytes).await?;

        versions.push_front(key.clone());
        self.record_type_history(key.clone()).await;

        info!(
            resource_type = %self.resource_type,
            id = %id_part,
            version = key.version(),
            change = ?change,
            "Resource stored"
        );
        Ok(Stored {
            id,
            created,
            resource,
        })
    }

    fn versions_of(&self, id_part: &str) -> Option<VersionList> {
        self.history_index.get(id_part).map(|entry| entry.clone())
    }

    /// Whether the identity has ever been stored. An empty list left by a
    /// failed first write does not count.
    async fn is_known(&self, id_part: &str) -> bool {
        match self.versions_of(id_part) {
            Some(list) => !list.lock().await.is_empty(),
            None => false,
        }
    }

    /// Inserts into the type history keeping most-recent-first order.
    /// Writers for different ids may finish out of version order.
    async fn record_type_history(&self, key: VersionedKey) {
        let mut type_history = self.type_history.write().await;
        let position = type_history
            .iter()
            .position(|existing| existing.version() < key.version())
            .unwrap_or(type_history.len());
        type_history.insert(position, key);
    }

    fn stamp_meta(&self, resource: &mut Resource, version: i64) {
        if self.history.is_none() || resource.field(META_CHILD).is_empty() {
            return;
        }
        let Some(version_child) = self
            .ctx
            .schema
            .element_definition("Meta")
            .and_then(|def| def.child_by_name(VERSION_ID_CHILD))
        else {
            return;
        };
        if let Some(meta) = resource
            .field_mut(META_CHILD)
            .first_mut()
            .and_then(Base::as_element_mut)
        {
            version_child.mutator().set_value(
                meta,
                Some(Base::Primitive(Primitive::with_value("id", version.to_string()))),
            );
        }
    }

    async fn fire_storage_hooks(
        &self,
        change: StorageChange,
        old: Option<Resource>,
        new: Option<Resource>,
        request: Option<&RequestDetails>,
    ) -> Result<Option<Resource>> {
        let Some(request) = request else {
            return Ok(new);
        };
        let Some(broadcaster) = request.interceptor_broadcaster() else {
            return Ok(new);
        };

        let mut params = HookParams::new(self.resource_type.clone())
            .with_request(request)
            .with_transaction(TransactionDetails::new())
            .with_old_resource(old);
        params.new_resource = new;

        for pointcut in [Pointcut::prestorage(change), Pointcut::precommit(change)] {
            if broadcaster.has_hooks(pointcut) {
                debug!(pointcut = %pointcut, resource_type = %self.resource_type, "Firing storage hooks");
                broadcaster.call_hooks(pointcut, &mut params).await?;
            }
        }
        Ok(params.new_resource)
    }

    /// Runs the pre-access and pre-show pointcuts over resources about to
    /// be returned.
    async fn filter_for_access(
        &self,
        resources: Vec<Resource>,
        request: Option<&RequestDetails>,
    ) -> Result<Vec<Resource>> {
        let Some(request) = request else {
            return Ok(resources);
        };
        let Some(broadcaster) = request.interceptor_broadcaster() else {
            return Ok(resources);
        };
        if resources.is_empty() {
            return Ok(resources);
        }

        let mut params = HookParams::new(self.resource_type.clone()).with_request(request);

        let allowed = if broadcaster.has_hooks(Pointcut::StoragePreaccessResources) {
            params.access_details = Some(PreResourceAccessDetails::new(resources));
            broadcaster
                .call_hooks(Pointcut::StoragePreaccessResources, &mut params)
                .await?;
            params
                .access_details
                .take()
                .map(PreResourceAccessDetails::into_allowed)
                .unwrap_or_default()
        } else {
            resources
        };
        if allowed.is_empty() || !broadcaster.has_hooks(Pointcut::StoragePreshowResources) {
            return Ok(allowed);
        }

        params.show_details = Some(PreResourceShowDetails::new(allowed));
        broadcaster
            .call_hooks(Pointcut::StoragePreshowResources, &mut params)
            .await?;
        Ok(params
            .show_details
            .take()
            .map(PreResourceShowDetails::into_resources)
            .unwrap_or_default())
    }

    async fn read_current(&self, id_part: &str) -> Result<Option<Resource>> {
        match self.current.get(&id_part.to_string()).await? {
            Some(bytes) => self.decode(&bytes),
            None => Ok(None),
        }
    }

    async fn current_version(&self, id_part: &str) -> Result<Option<i64>> {
        Ok(self
            .read_current(id_part)
            .await?
            .and_then(|r| r.id_element().version_id_part_as_long().ok()))
    }

    /// A live version: `None` when absent, purged or a deletion. Without a
    /// history map only the current value can answer.
    async fn read_version_entry(&self, key: &VersionedKey) -> Result<Option<Resource>> {
        match &self.history {
            Some(history) => match history.get(key).await? {
                Some(bytes) => self.decode(&bytes),
                None => Ok(None),
            },
            None => Ok(self
                .read_current(key.id_part())
                .await?
                .filter(|r| r.id_element().version_id_part_as_long().ok() == Some(key.version()))),
        }
    }

    /// Decodes stored bytes; an encoded null is a deletion.
    fn decode(&self, bytes: &[u8]) -> Result<Option<Resource>> {
        match from_bytes(bytes)? {
            RecordValue::Null => Ok(None),
            RecordValue::Record(record) => {
                let mut resource = Resource::new(&self.resource_type);
                self.codec
                    .decode_resource(&self.ctx.schema, &mut resource, &record)?;
                Ok(Some(resource))
            }
            _ => Err(CoreError::codec(format!(
                "{} entry is neither a record nor a deletion",
                self.resource_type
            ))),
        }
    }

    fn decode_or_skip(&self, bytes: &[u8], what: &str) -> Option<Resource> {
        match self.decode(bytes) {
            Ok(resource) => resource,
            Err(e) => {
                warn!(resource_type = %self.resource_type, entry = %what, error = %e, "Skipping unreadable entry");
                None
            }
        }
    }

    fn decode_entries(&self, mut entries: Vec<(String, Vec<u8>)>) -> Vec<Resource> {
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
            .iter()
            .filter_map(|(id, bytes)| self.decode_or_skip(bytes, id))
            .collect()
    }

    fn check_resource_type(&self, resource_type: &str) -> Result<()> {
        if resource_type == self.resource_type {
            Ok(())
        } else {
            Err(CoreError::invalid_resource(format!(
                "Resource type {resource_type} does not match store type {}",
                self.resource_type
            )))
        }
    }

    fn check_id_type(&self, id: &IdType) -> Result<()> {
        match id.resource_type.as_deref() {
            Some(rt) if rt != self.resource_type => Err(CoreError::invalid_request(format!(
                "Identifier {id} does not address {}",
                self.resource_type
            ))),
            _ => Ok(()),
        }
    }
}

struct Stored {
    id: IdType,
    created: bool,
    resource: Resource,
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("resource_type", &self.resource_type)
            .field("options", &self.options)
            .field("identities", &self.history_index.len())
            .field("counts", &self.counters.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_grid::LocalGrid;

    async fn open(grid: &LocalGrid, options: StoreOptions) -> ResourceStore {
        let ctx = StoreContext {
            schema: Arc::new(SchemaContext::r4()),
            allocator: Arc::new(IdentifierAllocator::new(Arc::new(LocalGrid::new("ids")))),
            oracle: Arc::new(VersionOracle::new()),
        };
        ResourceStore::open(grid, ctx, "Patient", options).await.unwrap()
    }

    #[test]
    fn test_type_history_mode_parse() {
        assert_eq!("Versions".parse::<TypeHistoryMode>().unwrap(), TypeHistoryMode::Versions);
        assert!("all".parse::<TypeHistoryMode>().is_err());
    }

    #[tokio::test]
    async fn test_meta_version_is_stamped() {
        let grid = LocalGrid::new("meta");
        let store = open(&grid, StoreOptions::default()).await;
        let resource = Resource::from_element(
            octofhir_core::Element::new("Patient").with_element("meta", octofhir_core::Element::new("Meta")),
        );

        let outcome = store.create(resource, None).await.unwrap();
        let stored = store.read(&outcome.id.to_versionless(), None).await.unwrap();
        let meta = stored.field("meta")[0].as_element().unwrap();
        let version_id = meta.field("versionId")[0].as_primitive().unwrap();
        assert_eq!(version_id.value_as_string(), outcome.id.version_id_part());
    }

    #[tokio::test]
    async fn test_meta_not_added_when_absent() {
        let grid = LocalGrid::new("nometa");
        let store = open(&grid, StoreOptions::default()).await;
        let outcome = store.create(Resource::new("Patient"), None).await.unwrap();
        let stored = store.read(&outcome.id, None).await.unwrap();
        assert!(stored.field("meta").is_empty());
    }

    #[tokio::test]
    async fn test_type_mismatch_rejected() {
        let grid = LocalGrid::new("types");
        let store = open(&grid, StoreOptions::default()).await;
        let err = store.create(Resource::new("Observation"), None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidResource { .. }));

        let err = store.read(&IdType::parse("Observation/1"), None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_conditional_update_unsupported() {
        let grid = LocalGrid::new("conditional");
        let store = open(&grid, StoreOptions::default()).await;
        let err = store
            .update(Resource::new("Patient").with_id("1"), Some("Patient?identifier=x"), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request: This server doesn't support conditional update"
        );

        // A blank conditional URL is ignored.
        store
            .update(Resource::new("Patient").with_id("1"), Some("  "), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_without_id_rejected() {
        let grid = LocalGrid::new("noid");
        let store = open(&grid, StoreOptions::default()).await;
        let err = store.update(Resource::new("Patient"), None, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_history_disabled() {
        let grid = LocalGrid::new("nohistory");
        let store = open(
            &grid,
            StoreOptions {
                history_enabled: false,
                ..Default::default()
            },
        )
        .await;
        assert!(store.cache_config().1.is_none());

        let first = store
            .update(Resource::new("Patient").with_id("a"), None, None)
            .await
            .unwrap();
        let second = store
            .update(Resource::new("Patient").with_id("a"), None, None)
            .await
            .unwrap();
        assert_eq!(first.created, Some(true));
        assert_eq!(second.created, Some(false));

        assert!(store.history_for_id("a", None).await.unwrap().is_empty());
        assert!(store.read(&second.id, None).await.is_ok());
        let err = store.read(&first.id, None).await.unwrap_err();
        assert!(err.is_gone());
    }

    #[tokio::test]
    async fn test_counters() {
        let grid = LocalGrid::new("counters");
        let store = open(&grid, StoreOptions::default()).await;
        let outcome = store.create(Resource::new("Patient"), None).await.unwrap();
        store.read(&outcome.id, None).await.unwrap();
        store.search_all(None).await.unwrap();
        assert_eq!(
            store.counts(),
            StoreCounts {
                create: 1,
                read: 1,
                update: 0,
                delete: 0,
                search: 1,
            }
        );
        store.clear_counts();
        assert_eq!(store.count_create(), 0);
    }

    #[tokio::test]
    async fn test_failed_and_utility_calls_not_counted() {
        let grid = LocalGrid::new("uncounted");
        let store = open(&grid, StoreOptions::default()).await;

        assert!(store.read(&IdType::parse("Patient/missing"), None).await.is_err());
        assert!(store.create(Resource::new("Patient").with_id("bad id!"), None).await.is_err());
        assert!(store.update(Resource::new("Patient"), None, None).await.is_err());
        assert!(store.delete(&IdType::parse("Patient/missing"), None).await.is_err());
        store.store_resource(Resource::new("Patient").with_id("s")).await.unwrap();
        store.store_resource(Resource::new("Patient")).await.unwrap();

        assert_eq!(store.counts(), StoreCounts::default());
    }

    #[tokio::test]
    async fn test_empty_version_list_is_not_found() {
        let grid = LocalGrid::new("stale");
        let store = open(&grid, StoreOptions::default()).await;
        // Left behind when a failed first write races a reader.
        store.history_index.insert("ghost".to_string(), VersionList::default());

        let err = store
            .read(&IdType::parse("Patient/ghost/_history/5"), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
