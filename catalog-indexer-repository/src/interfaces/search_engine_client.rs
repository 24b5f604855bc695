//! Search engine client trait definition.
//!
//! This module defines the abstract interface for search engine operations,
//! allowing for different backend implementations (OpenSearch, mock, etc.).

use async_trait::async_trait;

use crate::errors::SearchError;
use catalog_indexer_shared::{Entry, EntryId, SearchQuery, SearchResponse};

/// Abstract interface for search engine operations.
///
/// Upserts are keyed by entry identity, so indexing the same entry twice is a
/// no-op. This is what makes at-least-once delivery from the workers safe.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait SearchEngineClient: Send + Sync {
    /// Execute a search query against the index.
    ///
    /// # Arguments
    ///
    /// * `query` - The abstract query with sorting and paging
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResponse)` - The ranked documents
    /// * `Err(SearchError::InvalidQuery)` - If the query cannot be compiled
    /// * `Err(SearchError)` - If the search fails
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError>;

    /// Upsert entries in a single bulk operation, using their identity as
    /// document id.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If all documents were indexed successfully
    /// * `Err(SearchError::BulkIndexError)` - If any document failed to index
    async fn bulk_index(&self, entries: &[Entry]) -> Result<(), SearchError>;

    /// Delete documents by identity in a single bulk operation.
    ///
    /// Documents that do not exist are not an error.
    async fn bulk_delete(&self, ids: &[EntryId]) -> Result<(), SearchError>;

    /// Drop and recreate the index with its settings and mappings.
    ///
    /// Used before the first full index of a catalog.
    async fn recreate_index(&self) -> Result<(), SearchError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is unhealthy
    /// * `Err(SearchError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchError>;
}
