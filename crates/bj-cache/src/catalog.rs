//! # Type Catalog
//!
//! The catalog is the source of truth for which types each body path has
//! been observed with. Ingestion appends `(path, type, last_seen)` rows; the
//! cache reads them back in full or since a watermark.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::CatalogError;

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTypeRow {
    pub path: String,
    /// Engine spelling, e.g. `Array(Nullable(Int64))`.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub last_seen: u64,
}

impl PathTypeRow {
    pub fn new(path: impl Into<String>, type_name: impl Into<String>, last_seen: u64) -> Self {
        Self {
            path: path.into(),
            type_name: type_name.into(),
            last_seen,
        }
    }
}

/// 64-bit integers may arrive quoted depending on server settings.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Rows ordered by `last_seen` descending; only rows newer than `since`
    /// when given.
    async fn fetch_path_types(&self, since: Option<u64>) -> Result<Vec<PathTypeRow>, CatalogError>;

    /// Top-level paths that also live in the promoted column.
    async fn fetch_promoted_paths(&self) -> Result<Vec<String>, CatalogError>;

    /// Expressions of the ngram skip indexes on the logs table, e.g.
    /// `lower(assumeNotNull(dynamicElement(body_json.message, 'String')))`.
    async fn fetch_string_indexes(&self) -> Result<Vec<String>, CatalogError>;
}

// =============================================================================
// In-memory catalog
// =============================================================================

/// Catalog held in memory. Used for fixtures and tests; can be switched into
/// a failing mode to exercise the refresh error path.
#[derive(Default)]
pub struct MemoryCatalog {
    rows: RwLock<Vec<PathTypeRow>>,
    promoted: RwLock<Vec<String>>,
    string_indexes: RwLock<Vec<String>>,
    failing: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<PathTypeRow>) -> Self {
        let catalog = Self::new();
        *catalog.rows.write() = rows;
        catalog
    }

    pub fn push(&self, row: PathTypeRow) {
        self.rows.write().push(row);
    }

    /// Drop every row for `path`, as a TTL would.
    pub fn remove_path(&self, path: &str) {
        self.rows.write().retain(|r| r.path != path);
    }

    pub fn set_promoted(&self, paths: Vec<String>) {
        *self.promoted.write() = paths;
    }

    pub fn set_string_indexes(&self, exprs: Vec<String>) {
        *self.string_indexes.write() = exprs;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CatalogError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("memory catalog set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn fetch_path_types(&self, since: Option<u64>) -> Result<Vec<PathTypeRow>, CatalogError> {
        self.check()?;
        let mut rows: Vec<PathTypeRow> = self
            .rows
            .read()
            .iter()
            .filter(|r| since.map_or(true, |w| r.last_seen > w))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(rows)
    }

    async fn fetch_promoted_paths(&self) -> Result<Vec<String>, CatalogError> {
        self.check()?;
        Ok(self.promoted.read().clone())
    }

    async fn fetch_string_indexes(&self) -> Result<Vec<String>, CatalogError> {
        self.check()?;
        Ok(self.string_indexes.read().clone())
    }
}
