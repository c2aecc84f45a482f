//! Versioned FHIR resource store on a key-value grid.
//!
//! Every write of a resource produces a new version stamped by the
//! [`VersionOracle`]. The latest version lives in the `<Type>` map and, unless
//! history is disabled, every version lives in `<Type>_History` keyed by
//! [`VersionedKey`]. Interceptors registered on the request see and may veto
//! every write, and filter what reads return.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octofhir_core::{Resource, SchemaContext};
//! use octofhir_db_grid::{StoreRegistry, StoreRegistryOptions};
//! use octofhir_grid::LocalGrid;
//!
//! let registry = StoreRegistry::open(
//!     LocalGrid::new_shared("local"),
//!     Arc::new(SchemaContext::r4()),
//!     StoreRegistryOptions::default(),
//! )
//! .await?;
//! let patients = registry.store("Patient")?;
//! let outcome = patients.create(Resource::new("Patient"), None).await?;
//! ```

pub mod allocator;
pub mod cache_config;
pub mod key;
pub mod registry;
pub mod store;
pub mod version;

pub use allocator::IdentifierAllocator;
pub use cache_config::{HISTORY_SUFFIX, cache_configuration_for, history_cache_configuration_for};
pub use key::VersionedKey;
pub use registry::{StoreRegistry, StoreRegistryOptions};
pub use store::{
    MethodOutcome, ResourceStore, StoreContext, StoreCounts, StoreOptions, TypeHistoryMode,
};
pub use version::{Clock, SystemClock, VersionOracle};
