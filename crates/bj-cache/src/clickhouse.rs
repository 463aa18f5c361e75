//! # ClickHouse Catalog
//!
//! Reads the path-type and promoted-path tables over the ClickHouse HTTP
//! interface. Results come back as `JSONEachRow`, one object per line.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::catalog::{Catalog, PathTypeRow};
use crate::config::CatalogConfig;
use crate::error::CatalogError;

pub struct ClickHouseCatalog {
    client: reqwest::Client,
    config: CatalogConfig,
}

impl ClickHouseCatalog {
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Full scan (`FINAL`) or watermark-bounded scan, newest first.
    pub fn path_types_query(&self, since: Option<u64>) -> String {
        let table = format!("{}.{}", self.config.database, self.config.path_types_table);
        match since {
            None => format!(
                "SELECT path, type, last_seen FROM {} FINAL ORDER BY last_seen DESC",
                table
            ),
            Some(watermark) => format!(
                "SELECT path, type, last_seen FROM {} WHERE last_seen > {} ORDER BY last_seen DESC",
                table, watermark
            ),
        }
    }

    pub fn promoted_paths_query(&self) -> String {
        format!(
            "SELECT path FROM {}.{}",
            self.config.database, self.config.promoted_paths_table
        )
    }

    /// Ngram skip indexes of the logs table.
    pub fn string_indexes_query(&self) -> String {
        format!(
            "SELECT expr FROM system.data_skipping_indices WHERE database = '{}' AND table = '{}' AND type = 'ngrambf_v1'",
            self.config.database.replace('\'', "''"),
            self.config.logs_table.replace('\'', "''")
        )
    }

    async fn query<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, CatalogError> {
        tracing::debug!("catalog query: {}", sql);

        let mut request = self
            .client
            .post(&self.config.url)
            .query(&[
                ("database", self.config.database.as_str()),
                ("output_format_json_quote_64bit_integers", "0"),
            ])
            .body(format!("{} FORMAT JSONEachRow", sql));

        if !self.config.user.is_empty() {
            request = request.header("X-ClickHouse-User", self.config.user.as_str());
        }
        if !self.config.password.is_empty() {
            request = request.header("X-ClickHouse-Key", self.config.password.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        parse_rows(&body)
    }
}

#[derive(Deserialize)]
struct PromotedRow {
    path: String,
}

#[derive(Deserialize)]
struct IndexRow {
    expr: String,
}

/// Decode a `JSONEachRow` body.
pub fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, CatalogError> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(CatalogError::from))
        .collect()
}

#[async_trait]
impl Catalog for ClickHouseCatalog {
    async fn fetch_path_types(&self, since: Option<u64>) -> Result<Vec<PathTypeRow>, CatalogError> {
        self.query(&self.path_types_query(since)).await
    }

    async fn fetch_promoted_paths(&self) -> Result<Vec<String>, CatalogError> {
        let rows: Vec<PromotedRow> = self.query(&self.promoted_paths_query()).await?;
        Ok(rows.into_iter().map(|r| r.path).collect())
    }

    async fn fetch_string_indexes(&self) -> Result<Vec<String>, CatalogError> {
        let rows: Vec<IndexRow> = self.query(&self.string_indexes_query()).await?;
        Ok(rows.into_iter().map(|r| r.expr).collect())
    }
}
