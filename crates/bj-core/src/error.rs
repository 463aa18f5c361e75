//! Error types for the core vocabulary

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operator text that does not name any known operator
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// Type text that does not name any observed type
    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("empty path")]
    EmptyPath,
}
