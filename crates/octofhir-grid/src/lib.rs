//! Key-value grid substrate for the OctoFHIR store.
//!
//! A [`Grid`] hands out named [`GridMap`]s and [`AtomicCounter`]s and
//! publishes cache events. [`LocalGrid`] is the in-process implementation;
//! a clustered grid implements the same traits.

pub mod config;
pub mod error;
pub mod events;
pub mod grid;
pub mod local;

pub use config::{CacheMode, MapConfig};
pub use error::{GridError, GridResult};
pub use events::{GridEvent, GridEventBroadcaster, GridEventKind};
pub use grid::{AtomicCounter, Grid, GridKey, GridMap, GridValue, ScanFilter};
pub use local::{LocalGrid, LocalGridOptions};
