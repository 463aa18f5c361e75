//! # Type Lookup
//!
//! The planner never talks to a cache directly. It asks a [`TypeLookup`],
//! so a refreshed catalog cache and a static fixture are interchangeable.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::ObservedType;

pub trait TypeLookup {
    /// Observed types for a lookup path, sorted and without duplicates.
    /// Empty when the path was never seen.
    fn types(&self, path: &str) -> Vec<ObservedType>;

    /// Whether `column.path` has an ngram skip index over its String
    /// sub-column. Only top-level paths can be indexed.
    fn string_indexed(&self, _column: &str, _path: &str) -> bool {
        false
    }
}

impl TypeLookup for HashMap<String, Vec<ObservedType>> {
    fn types(&self, path: &str) -> Vec<ObservedType> {
        self.get(path)
            .map(|ts| ts.iter().copied().collect::<BTreeSet<_>>().into_iter().collect())
            .unwrap_or_default()
    }
}

impl<T: TypeLookup + ?Sized> TypeLookup for &T {
    fn types(&self, path: &str) -> Vec<ObservedType> {
        (**self).types(path)
    }

    fn string_indexed(&self, column: &str, path: &str) -> bool {
        (**self).string_indexed(column, path)
    }
}

impl<T: TypeLookup + ?Sized> TypeLookup for Arc<T> {
    fn types(&self, path: &str) -> Vec<ObservedType> {
        (**self).types(path)
    }

    fn string_indexed(&self, column: &str, path: &str) -> bool {
        (**self).string_indexed(column, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_lookup_sorts_and_dedups() {
        let mut map = HashMap::new();
        map.insert(
            "education[].type".to_string(),
            vec![ObservedType::Int64, ObservedType::String, ObservedType::Int64],
        );
        assert_eq!(
            map.types("education[].type"),
            vec![ObservedType::String, ObservedType::Int64]
        );
        assert!(map.types("missing").is_empty());
        assert!(!map.string_indexed("body_json", "education[].type"));
    }
}
