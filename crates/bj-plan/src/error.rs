//! Error types for plan building and emission

use bj_core::Operator;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Contract errors. None of these are retried; they surface to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(Operator),

    #[error("empty path")]
    EmptyPath,

    /// Traversal asked for a segment past the end of the path
    #[error("plan index out of bounds: index {index}, {len} segments")]
    PlanIndexOutOfBounds { index: usize, len: usize },

    /// Group-by extraction found nothing it can unnest or extract
    #[error("no valid types found for path: {0}")]
    NoValidTypes(String),
}
