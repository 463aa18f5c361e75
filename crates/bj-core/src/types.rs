//! # Observed Types
//!
//! The physical representations the storage engine records for a JSON path.
//! A path may carry several at once; type drift across records is normal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A physical representation of a JSON value as stored by the engine.
///
/// Variant order is significant: "first observed type" always means first in
/// declaration order, so defaults stay deterministic over unordered sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ObservedType {
    String,
    Int64,
    Float64,
    Bool,
    Dynamic,
    ArrayString,
    ArrayInt64,
    ArrayFloat64,
    ArrayBool,
    /// Array of nested objects.
    ArrayJson,
    /// Heterogeneous array; elements carry their own runtime type tag.
    ArrayDynamic,
}

impl ObservedType {
    pub const ALL: [ObservedType; 11] = [
        ObservedType::String,
        ObservedType::Int64,
        ObservedType::Float64,
        ObservedType::Bool,
        ObservedType::Dynamic,
        ObservedType::ArrayString,
        ObservedType::ArrayInt64,
        ObservedType::ArrayFloat64,
        ObservedType::ArrayBool,
        ObservedType::ArrayJson,
        ObservedType::ArrayDynamic,
    ];

    /// Engine spelling, as used in `dynamicElement(..., '<type>')`.
    pub fn as_str(self) -> &'static str {
        match self {
            ObservedType::String => "String",
            ObservedType::Int64 => "Int64",
            ObservedType::Float64 => "Float64",
            ObservedType::Bool => "Bool",
            ObservedType::Dynamic => "Dynamic",
            ObservedType::ArrayString => "Array(Nullable(String))",
            ObservedType::ArrayInt64 => "Array(Nullable(Int64))",
            ObservedType::ArrayFloat64 => "Array(Nullable(Float64))",
            ObservedType::ArrayBool => "Array(Nullable(Bool))",
            ObservedType::ArrayJson => "Array(JSON)",
            ObservedType::ArrayDynamic => "Array(Dynamic)",
        }
    }

    fn variant_name(self) -> &'static str {
        match self {
            ObservedType::String => "String",
            ObservedType::Int64 => "Int64",
            ObservedType::Float64 => "Float64",
            ObservedType::Bool => "Bool",
            ObservedType::Dynamic => "Dynamic",
            ObservedType::ArrayString => "ArrayString",
            ObservedType::ArrayInt64 => "ArrayInt64",
            ObservedType::ArrayFloat64 => "ArrayFloat64",
            ObservedType::ArrayBool => "ArrayBool",
            ObservedType::ArrayJson => "ArrayJSON",
            ObservedType::ArrayDynamic => "ArrayDynamic",
        }
    }

    /// Map a catalog type string. Never fails: anything unrecognized is
    /// `Dynamic`, and parameterized `Array(JSON(...))` spellings collapse to
    /// [`ObservedType::ArrayJson`].
    pub fn from_catalog(s: &str) -> ObservedType {
        let s = s.trim();
        if s.starts_with("Array(JSON(") {
            return ObservedType::ArrayJson;
        }
        s.parse().unwrap_or(ObservedType::Dynamic)
    }

    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            ObservedType::String | ObservedType::Int64 | ObservedType::Float64 | ObservedType::Bool
        )
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            ObservedType::ArrayString
                | ObservedType::ArrayInt64
                | ObservedType::ArrayFloat64
                | ObservedType::ArrayBool
                | ObservedType::ArrayJson
                | ObservedType::ArrayDynamic
        )
    }

    /// Typed-array counterpart of a scalar.
    pub fn array_of(self) -> Option<ObservedType> {
        match self {
            ObservedType::String => Some(ObservedType::ArrayString),
            ObservedType::Int64 => Some(ObservedType::ArrayInt64),
            ObservedType::Float64 => Some(ObservedType::ArrayFloat64),
            ObservedType::Bool => Some(ObservedType::ArrayBool),
            _ => None,
        }
    }

    /// Scalar element of a typed array.
    pub fn element(self) -> Option<ObservedType> {
        match self {
            ObservedType::ArrayString => Some(ObservedType::String),
            ObservedType::ArrayInt64 => Some(ObservedType::Int64),
            ObservedType::ArrayFloat64 => Some(ObservedType::Float64),
            ObservedType::ArrayBool => Some(ObservedType::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for ObservedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObservedType {
    type Err = Error;

    /// Accepts both the engine spelling and the variant name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ObservedType::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.variant_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownType(s.to_string()))
    }
}

impl TryFrom<String> for ObservedType {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ObservedType> for String {
    fn from(t: ObservedType) -> Self {
        t.as_str().to_string()
    }
}
