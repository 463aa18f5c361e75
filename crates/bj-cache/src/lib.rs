//! # bj-cache: path-type cache for body-JSON filtering
//!
//! Keeps an eventually consistent copy of the type catalog so filter
//! compilation never waits on the database.
//!
//! - [`PathTypeCache`]: the shared map, also the planner's [`bj_core::TypeLookup`].
//! - [`Catalog`]: where rows come from ([`ClickHouseCatalog`] or [`MemoryCatalog`]).
//! - [`spawn_refresh_tasks`]: periodic full, incremental and promoted-path syncs.

pub mod cache;
pub mod catalog;
pub mod clickhouse;
pub mod config;
pub mod error;
pub mod refresh;

pub use cache::{index_sub_column, CacheStats, PathTypeCache, RefreshOutcome};
pub use catalog::{Catalog, MemoryCatalog, PathTypeRow};
pub use clickhouse::ClickHouseCatalog;
pub use config::{CatalogConfig, Config, RefreshConfig};
pub use error::{CatalogError, ConfigError};
pub use refresh::{spawn_refresh_tasks, RefreshTasks};
