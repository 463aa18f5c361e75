//! # Field Keys and Paths
//!
//! A logical path looks like `education[].awards[].type`: dots address
//! object keys, `[]` marks a hop into an array of objects. The planner works
//! on the segments between hops.

use serde::{Deserialize, Serialize};

use crate::{Error, ObservedType};

/// Separator between array hops in a logical path.
pub const ARRAY_SEP: &str = "[].";

/// Search prefix users may put in front of body paths.
pub const BODY_PREFIX: &str = "body.";

/// The field being filtered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldKey {
    pub name: String,
    /// Declared value type, used when no literal is available.
    #[serde(default)]
    pub data_type: Option<ObservedType>,
    /// The path may also live in the promoted column.
    #[serde(default)]
    pub promoted: bool,
}

impl FieldKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            promoted: false,
        }
    }

    pub fn promoted(mut self, promoted: bool) -> Self {
        self.promoted = promoted;
        self
    }

    pub fn with_type(mut self, data_type: ObservedType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Normalized logical path: `body.` prefix stripped, `[*]` written as `[]`.
    pub fn path(&self) -> String {
        let name = self.name.trim();
        let name = name.strip_prefix(BODY_PREFIX).unwrap_or(name);
        name.replace("[*]", "[]")
    }
}

/// Physical columns a body path can live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Columns {
    #[serde(default = "default_body_column")]
    pub body: String,
    #[serde(default = "default_promoted_column")]
    pub promoted: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            body: default_body_column(),
            promoted: default_promoted_column(),
        }
    }
}

fn default_body_column() -> String {
    "body_json".to_string()
}
fn default_promoted_column() -> String {
    "body_json_promoted".to_string()
}

/// Split a normalized path into hop segments.
pub fn split_path(path: &str) -> Result<Vec<String>, Error> {
    if path.trim().is_empty() {
        return Err(Error::EmptyPath);
    }
    let parts: Vec<String> = path.split(ARRAY_SEP).map(str::to_string).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::EmptyPath);
    }
    Ok(parts)
}

/// Catalog key for the segment at `index`: all segments up to and including
/// it, joined with the hop separator.
pub fn lookup_path(parts: &[String], index: usize) -> String {
    let end = (index + 1).min(parts.len());
    parts[..end].join(ARRAY_SEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_normalization() {
        assert_eq!(FieldKey::new("body.user.name").path(), "user.name");
        assert_eq!(
            FieldKey::new("education[*].awards[*].type").path(),
            "education[].awards[].type"
        );
        assert_eq!(FieldKey::new("message").path(), "message");
    }

    #[test]
    fn test_split_and_lookup() {
        let parts = split_path("education[].awards[].type").unwrap();
        assert_eq!(parts, vec!["education", "awards", "type"]);
        assert_eq!(lookup_path(&parts, 0), "education");
        assert_eq!(lookup_path(&parts, 1), "education[].awards");
        assert_eq!(lookup_path(&parts, 2), "education[].awards[].type");
    }

    #[test]
    fn test_split_empty() {
        assert_eq!(split_path(""), Err(Error::EmptyPath));
        assert_eq!(split_path("education[]."), Err(Error::EmptyPath));
    }

    #[test]
    fn test_dotted_keys_stay_in_one_segment() {
        let parts = split_path("user.address.city").unwrap();
        assert_eq!(parts, vec!["user.address.city"]);
    }
}
