//! # Path-Type Cache
//!
//! Process-wide view of the type catalog: for each body path, the set of
//! physical types it has ever been observed with.
//!
//! The current map sits behind an `Arc` that readers clone out of a
//! short-held lock; lookups then run against that snapshot lock-free.
//! A full refresh builds a new map and swaps the `Arc`; an incremental
//! refresh inserts into the per-path sets of the current map in place.
//! Refreshes run one at a time, so an incremental merge never lands in a
//! map that a concurrent full refresh is about to discard.
//!
//! Alongside the types it keeps two small registries replaced wholesale on
//! each sync: promoted top-level paths, and `column.path` sub-columns that
//! carry an ngram skip index over their String values.
//!
//! The cache is advisory. A failed refresh leaves the previous snapshot in
//! service, and a path missing from the cache just means the planner infers
//! its type from the literal.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bj_core::{FieldKey, ObservedType, TypeLookup};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::catalog::{Catalog, PathTypeRow};
use crate::error::CatalogError;

type TypeMap = DashMap<String, DashSet<ObservedType>>;

/// Result of one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Catalog rows folded in; zero means nothing changed.
    pub rows: usize,
    pub watermark: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub paths: usize,
    pub promoted_paths: usize,
    pub string_indexed_paths: usize,
    pub watermark: u64,
    pub last_full_refresh: Option<DateTime<Utc>>,
    pub last_incremental_refresh: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct RefreshTimes {
    full: Option<DateTime<Utc>>,
    incremental: Option<DateTime<Utc>>,
}

pub struct PathTypeCache {
    catalog: Arc<dyn Catalog>,
    types: RwLock<Arc<TypeMap>>,
    /// Highest `last_seen` folded in so far; only ever moves forward.
    watermark: AtomicU64,
    promoted: RwLock<Arc<HashSet<String>>>,
    string_indexed: RwLock<Arc<HashSet<String>>>,
    times: RwLock<RefreshTimes>,
    refresh_lock: Mutex<()>,
}

impl PathTypeCache {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            types: RwLock::new(Arc::new(TypeMap::new())),
            watermark: AtomicU64::new(0),
            promoted: RwLock::new(Arc::new(HashSet::new())),
            string_indexed: RwLock::new(Arc::new(HashSet::new())),
            times: RwLock::new(RefreshTimes::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Arc<TypeMap> {
        self.types.read().clone()
    }

    /// Observed types for `path`, sorted. Empty if never seen.
    pub fn get(&self, path: &str) -> Vec<ObservedType> {
        let snapshot = self.snapshot();
        let mut types: Vec<ObservedType> = match snapshot.get(path) {
            Some(set) => set.iter().map(|t| *t).collect(),
            None => Vec::new(),
        };
        types.sort();
        types
    }

    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }

    /// Every cached path with its types, sorted by path.
    pub fn entries(&self) -> Vec<(String, Vec<ObservedType>)> {
        let snapshot = self.snapshot();
        let mut entries: Vec<(String, Vec<ObservedType>)> = snapshot
            .iter()
            .map(|entry| {
                let mut types: Vec<ObservedType> = entry.value().iter().map(|t| *t).collect();
                types.sort();
                (entry.key().clone(), types)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Pull from the catalog. `full` replaces the whole map from a `FINAL`
    /// scan; otherwise rows newer than the watermark are merged in.
    pub async fn refresh(&self, full: bool) -> Result<RefreshOutcome, CatalogError> {
        let _guard = self.refresh_lock.lock().await;
        let since = if full { None } else { Some(self.watermark()) };
        let rows = self.catalog.fetch_path_types(since).await?;

        if rows.is_empty() {
            tracing::debug!(
                "{} refresh: no new rows after watermark {}",
                kind(full),
                self.watermark()
            );
            return Ok(RefreshOutcome {
                rows: 0,
                watermark: self.watermark(),
            });
        }

        let newest = rows.iter().map(|r| r.last_seen).max().unwrap_or(0);
        let count = rows.len();

        if full {
            let map = TypeMap::new();
            fold(&map, rows);
            let paths = map.len();
            *self.types.write() = Arc::new(map);
            self.times.write().full = Some(Utc::now());
            tracing::info!("full refresh: {} rows, {} paths", count, paths);
        } else {
            fold(&self.snapshot(), rows);
            self.times.write().incremental = Some(Utc::now());
            tracing::debug!("incremental refresh: {} rows", count);
        }

        let previous = self.watermark.fetch_max(newest, Ordering::AcqRel);
        Ok(RefreshOutcome {
            rows: count,
            watermark: previous.max(newest),
        })
    }

    /// Replace the promoted-path set from the catalog.
    pub async fn sync_promoted(&self) -> Result<usize, CatalogError> {
        let paths = self.catalog.fetch_promoted_paths().await?;
        let set: HashSet<String> = paths
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let count = set.len();
        *self.promoted.write() = Arc::new(set);
        tracing::debug!("promoted paths synced: {}", count);
        Ok(count)
    }

    /// Whether the top-level key of `path` lives in the promoted column.
    pub fn is_promoted(&self, path: &str) -> bool {
        let normalized = FieldKey::new(path).path();
        let head = normalized
            .split('.')
            .next()
            .unwrap_or_default()
            .trim_end_matches("[]");
        self.promoted.read().contains(head)
    }

    /// Replace the indexed sub-column set from the catalog's skip indexes.
    /// Expressions that do not address a String sub-column are skipped.
    pub async fn sync_string_indexes(&self) -> Result<usize, CatalogError> {
        let exprs = self.catalog.fetch_string_indexes().await?;
        let mut set = HashSet::with_capacity(exprs.len());
        for expr in &exprs {
            match index_sub_column(expr) {
                Some(column) => {
                    set.insert(column);
                }
                None => tracing::debug!("skip index {:?} is not over a String sub-column", expr),
            }
        }
        let count = set.len();
        *self.string_indexed.write() = Arc::new(set);
        tracing::debug!("string indexed columns synced: {}", count);
        Ok(count)
    }

    /// Whether `path` under `column` has an indexed String sub-column.
    pub fn is_string_indexed(&self, column: &str, path: &str) -> bool {
        self.string_indexed
            .read()
            .contains(&format!("{}.{}", column, path))
    }

    /// Field key for `name`, flagged promoted when the registry says so.
    pub fn field_key(&self, name: &str) -> FieldKey {
        FieldKey::new(name).promoted(self.is_promoted(name))
    }

    pub fn stats(&self) -> CacheStats {
        let times = self.times.read();
        CacheStats {
            paths: self.snapshot().len(),
            promoted_paths: self.promoted.read().len(),
            string_indexed_paths: self.string_indexed.read().len(),
            watermark: self.watermark(),
            last_full_refresh: times.full,
            last_incremental_refresh: times.incremental,
        }
    }
}

impl TypeLookup for PathTypeCache {
    fn types(&self, path: &str) -> Vec<ObservedType> {
        self.get(path)
    }

    fn string_indexed(&self, column: &str, path: &str) -> bool {
        self.is_string_indexed(column, path)
    }
}

/// Sub-column addressed by a skip-index expression, as `column.path`:
/// `lower(assumeNotNull(dynamicElement(body_json.message, 'String')))`
/// yields `body_json.message`. `None` unless the expression reads a String.
pub fn index_sub_column(expr: &str) -> Option<String> {
    const CALL: &str = "dynamicElement(";
    let start = expr.find(CALL)? + CALL.len();
    let (column, tail) = expr[start..].split_once(',')?;
    if !tail.trim_start().starts_with("'String'") {
        return None;
    }
    let column: String = column.chars().filter(|c| *c != '`').collect();
    let column = column.trim();
    column.contains('.').then(|| column.to_string())
}

fn fold(map: &TypeMap, rows: Vec<PathTypeRow>) {
    for row in rows {
        let t = ObservedType::from_catalog(&row.type_name);
        if t == ObservedType::Dynamic && row.type_name.trim() != "Dynamic" {
            tracing::debug!("unknown catalog type {:?} for {}, treating as Dynamic", row.type_name, row.path);
        }
        map.entry(row.path).or_default().insert(t);
    }
}

fn kind(full: bool) -> &'static str {
    if full {
        "full"
    } else {
        "incremental"
    }
}
