//! Search entry point.
//!
//! Wraps [`SearchEngineClient::search`] into the [`ApiResult`] envelope
//! returned to API callers.

use tracing::{debug, error};

use catalog_indexer_repository::{SearchEngineClient, SearchError};
use catalog_indexer_shared::{ApiResult, ErrorType, SearchQuery, SearchResponse};

/// Run a search and wrap the outcome.
///
/// Queries the converter rejects are reported as `BadRequest`, every other
/// failure as `ServerError`.
pub async fn search(
    client: &dyn SearchEngineClient,
    query: &SearchQuery,
) -> ApiResult<SearchResponse> {
    match client.search(query).await {
        Ok(response) => {
            debug!(total = response.total, took_ms = response.took_ms, "Search complete");
            ApiResult::ok(response)
        }
        Err(SearchError::InvalidQuery(e)) => {
            debug!(error = %e, "Rejected search query");
            ApiResult::error(ErrorType::BadRequest, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Search failed");
            ApiResult::error(ErrorType::ServerError, e.to_string())
        }
    }
}

/// Run a search given as a JSON request body.
pub async fn search_json(client: &dyn SearchEngineClient, body: &str) -> ApiResult<SearchResponse> {
    match serde_json::from_str::<SearchQuery>(body) {
        Ok(query) => search(client, &query).await,
        Err(e) => ApiResult::error(ErrorType::BadRequest, format!("invalid search request: {}", e)),
    }
}
