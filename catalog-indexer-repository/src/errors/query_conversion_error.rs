//! Query conversion error types.

use thiserror::Error;

/// Errors raised while compiling an abstract query into a backend query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryConversionError {
    /// No registered handler accepts the query node.
    #[error("Unsupported query shape: {0}")]
    UnsupportedQuery(String),

    /// The node was recognized but its content is invalid.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl QueryConversionError {
    /// Create an unsupported query error.
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedQuery(kind.into())
    }

    /// Create an invalid query error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }
}
