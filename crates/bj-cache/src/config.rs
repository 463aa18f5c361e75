//! # Configuration
//!
//! Loaded from TOML; every field has a default so an empty or missing file
//! is a valid configuration.
//!
//! ```toml
//! [catalog]
//! url = "http://127.0.0.1:8123"
//! database = "logs"
//!
//! [refresh]
//! incremental_interval_secs = 30
//! string_index_interval_secs = 600
//!
//! [columns]
//! body = "body_json"
//! ```

use bj_core::Columns;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub columns: Columns,
}

impl Config {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_path_types_table")]
    pub path_types_table: String,
    #[serde(default = "default_promoted_paths_table")]
    pub promoted_paths_table: String,
    /// Logs table whose skip indexes are read.
    #[serde(default = "default_logs_table")]
    pub logs_table: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            database: default_database(),
            path_types_table: default_path_types_table(),
            promoted_paths_table: default_promoted_paths_table(),
            logs_table: default_logs_table(),
            user: default_user(),
            password: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_full_interval")]
    pub full_interval_secs: u64,
    #[serde(default = "default_incremental_interval")]
    pub incremental_interval_secs: u64,
    #[serde(default = "default_promoted_interval")]
    pub promoted_interval_secs: u64,
    #[serde(default = "default_string_index_interval")]
    pub string_index_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            full_interval_secs: default_full_interval(),
            incremental_interval_secs: default_incremental_interval(),
            promoted_interval_secs: default_promoted_interval(),
            string_index_interval_secs: default_string_index_interval(),
        }
    }
}

impl RefreshConfig {
    pub fn full_interval(&self) -> Duration {
        Duration::from_secs(self.full_interval_secs.max(1))
    }

    pub fn incremental_interval(&self) -> Duration {
        Duration::from_secs(self.incremental_interval_secs.max(1))
    }

    pub fn promoted_interval(&self) -> Duration {
        Duration::from_secs(self.promoted_interval_secs.max(1))
    }

    pub fn string_index_interval(&self) -> Duration {
        Duration::from_secs(self.string_index_interval_secs.max(1))
    }
}

fn default_url() -> String {
    "http://127.0.0.1:8123".to_string()
}
fn default_database() -> String {
    "logs".to_string()
}
fn default_path_types_table() -> String {
    "distributed_json_path_types".to_string()
}
fn default_promoted_paths_table() -> String {
    "distributed_json_promoted_paths".to_string()
}
fn default_logs_table() -> String {
    "logs_v2".to_string()
}
fn default_user() -> String {
    "default".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_full_interval() -> u64 {
    3600
}
fn default_incremental_interval() -> u64 {
    60
}
fn default_promoted_interval() -> u64 {
    60
}
fn default_string_index_interval() -> u64 {
    1800
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.catalog.url, "http://127.0.0.1:8123");
        assert_eq!(config.refresh.full_interval(), Duration::from_secs(3600));
        assert_eq!(config.refresh.incremental_interval(), Duration::from_secs(60));
        assert_eq!(config.refresh.string_index_interval(), Duration::from_secs(1800));
        assert_eq!(config.catalog.logs_table, "logs_v2");
        assert_eq!(config.columns, Columns::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [catalog]
            database = "otel_logs"

            [refresh]
            incremental_interval_secs = 15

            [columns]
            promoted = "promoted_body"
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog.database, "otel_logs");
        assert_eq!(config.catalog.user, "default");
        assert_eq!(config.refresh.incremental_interval_secs, 15);
        assert_eq!(config.refresh.promoted_interval_secs, 60);
        assert_eq!(config.columns.body, "body_json");
        assert_eq!(config.columns.promoted, "promoted_body");
    }

    #[test]
    fn test_invalid_config_is_reported() {
        assert!(matches!(
            Config::parse("[refresh]\nfull_interval_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load(Path::new("/nonexistent/bj.toml")).unwrap();
        assert_eq!(config.refresh.promoted_interval_secs, 60);
    }
}
