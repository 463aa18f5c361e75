//! # bj-core: shared vocabulary of the body-JSON filter compiler
//!
//! Log bodies are stored in a polymorphic JSON column: the same logical path
//! can be a scalar, a typed array, a heterogeneous `Dynamic` array or an array
//! of nested objects, depending on what was ingested. This crate defines the
//! types every other crate speaks:
//!
//! - [`ObservedType`]: a physical representation recorded by the catalog.
//! - [`Operator`]: the filter operator enumeration.
//! - [`FieldKey`] and [`Columns`]: what is being filtered and where it lives.
//! - [`TypeLookup`]: answers "which types has this path been seen with?".

pub mod error;
pub mod field;
pub mod lookup;
pub mod operator;
pub mod types;

pub use error::Error;
pub use field::{lookup_path, split_path, Columns, FieldKey, ARRAY_SEP, BODY_PREFIX};
pub use lookup::TypeLookup;
pub use operator::Operator;
pub use types::ObservedType;
