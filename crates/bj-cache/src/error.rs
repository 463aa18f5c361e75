//! Error types for the catalog and configuration

use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the type catalog. Background refreshes log these and
/// keep serving the last good snapshot.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status, with the server's message
    #[error("catalog returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("cannot decode catalog row: {0}")]
    Decode(#[from] serde_json::Error),

    /// Raised by in-memory catalogs to simulate an outage
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
