//! Interceptor hooks fired by resource stores.
//!
//! Storage pointcuts (`*_PRESTORAGE_*`, `*_PRECOMMIT_*`) run inside the
//! write path before anything is persisted, so an error from a hook aborts
//! the write. The access and show pointcuts run on every read path and may
//! hide or replace resources before they reach the caller.
//!
//! - [`pointcut`]: the pointcut enum
//! - [`params`]: `HookParams` and the access/show detail objects
//! - [`hooks`]: `Interceptor`, `InterceptorBroadcaster`, `HookError`
//! - [`registry`]: ordered `InterceptorRegistry`
//! - [`request`]: `RequestDetails`, `TransactionDetails`

pub mod hooks;
pub mod params;
pub mod pointcut;
pub mod registry;
pub mod request;

pub use hooks::{HookError, Interceptor, InterceptorBroadcaster};
pub use params::{HookParams, PreResourceAccessDetails, PreResourceShowDetails};
pub use pointcut::{Pointcut, StorageChange};
pub use registry::InterceptorRegistry;
pub use request::{RequestDetails, TransactionDetails};
