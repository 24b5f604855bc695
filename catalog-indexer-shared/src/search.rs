//! Search results and the request-level result envelope.

use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// A single ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document identity.
    pub id: String,
    /// Relevance score, if the engine computed one.
    pub score: Option<f64>,
    /// The indexed entry.
    pub document: Entry,
}

/// Ranked documents returned by a search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Total number of matching documents.
    pub total: u64,
    /// Time the engine spent on the query, in milliseconds.
    pub took_ms: u64,
    /// The requested page of hits.
    pub items: Vec<SearchHit>,
}

impl SearchResponse {
    /// An empty response.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Error categories reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorType {
    /// The request could not be understood (e.g. unsupported query shape).
    BadRequest,
    /// The request was valid but the server failed to answer it.
    ServerError,
}

/// One error entry of an [`ApiResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub details: String,
}

/// Envelope for request results: either `result` or `errors` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ResultError>>,
}

impl<T> ApiResult<T> {
    /// A successful result.
    pub fn ok(result: T) -> Self {
        Self {
            result: Some(result),
            errors: None,
        }
    }

    /// A failed result with the given error type and details.
    pub fn error(error_type: ErrorType, details: impl Into<String>) -> Self {
        Self {
            result: None,
            errors: Some(vec![ResultError {
                error_type,
                details: details.into(),
            }]),
        }
    }

    /// Whether the call succeeded.
    pub fn is_ok(&self) -> bool {
        self.errors.is_none()
    }
}
