//! Shared fixture for planner and emitter tests: the type catalog of a log
//! body with nested education records and a deep `interests` chain.

use std::collections::HashMap;

use bj_core::{split_path, ObservedType, TypeLookup};

pub fn segments(path: &str) -> Vec<String> {
    split_path(path).unwrap()
}

pub fn fixture_types() -> HashMap<String, Vec<ObservedType>> {
    use ObservedType::*;

    let entries: &[(&str, &[ObservedType])] = &[
        ("user.name", &[String]),
        ("user.age", &[Int64]),
        ("user.height", &[Float64]),
        ("message", &[String]),
        ("tags", &[ArrayString]),
        ("scores", &[Int64, ArrayInt64, ArrayDynamic]),
        ("education", &[ArrayJson]),
        ("education[].name", &[String]),
        ("education[].type", &[String, Int64]),
        ("education[].parameters", &[ArrayFloat64, ArrayDynamic]),
        ("education[].year", &[Int64]),
        ("education[].awards", &[ArrayDynamic, ArrayJson]),
        ("education[].awards[].name", &[String]),
        ("education[].awards[].type", &[String]),
        ("education[].awards[].participated", &[ArrayDynamic, ArrayJson]),
        ("education[].awards[].participated[].team", &[ArrayJson]),
        ("education[].awards[].participated[].team[].branch", &[String]),
        ("interests", &[ArrayJson]),
        ("interests[].entities", &[ArrayJson]),
        ("interests[].entities[].reviews", &[ArrayJson]),
        ("interests[].entities[].reviews[].entries", &[ArrayJson]),
        ("interests[].entities[].reviews[].entries[].metadata", &[ArrayJson]),
        ("interests[].entities[].reviews[].entries[].metadata[].positions", &[ArrayJson]),
        ("interests[].entities[].reviews[].entries[].metadata[].positions[].name", &[String]),
        (
            "interests[].entities[].reviews[].entries[].metadata[].positions[].ratings",
            &[ArrayInt64, ArrayString],
        ),
    ];

    entries
        .iter()
        .map(|(path, types)| (path.to_string(), types.to_vec()))
        .collect()
}

/// Fixture types plus a set of ngram-indexed `column.path` sub-columns.
pub struct IndexedFixture {
    pub types: HashMap<String, Vec<ObservedType>>,
    pub indexed: Vec<String>,
}

impl IndexedFixture {
    pub fn new(indexed: &[&str]) -> Self {
        Self {
            types: fixture_types(),
            indexed: indexed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TypeLookup for IndexedFixture {
    fn types(&self, path: &str) -> Vec<ObservedType> {
        self.types.types(path)
    }

    fn string_indexed(&self, column: &str, path: &str) -> bool {
        let key = format!("{}.{}", column, path);
        self.indexed.iter().any(|k| *k == key)
    }
}
