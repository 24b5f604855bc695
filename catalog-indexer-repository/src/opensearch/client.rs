//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchEngineClient`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCloseParts, IndicesCreateParts, IndicesDeleteParts, IndicesOpenParts,
        IndicesPutMappingParts, IndicesPutSettingsParts,
    },
    BulkParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchError;
use crate::interfaces::SearchEngineClient;
use crate::opensearch::converter::QueryConverter;
use crate::opensearch::index_config::IndexConfig;
use crate::opensearch::queries::build_search_body;
use catalog_indexer_shared::{Entry, EntryId, SearchHit, SearchQuery, SearchResponse};

/// OpenSearch client implementation.
///
/// Documents are stored under their [`EntryId`], so re-indexing an entry
/// overwrites the previous copy.
///
/// # Example
///
/// ```ignore
/// use catalog_indexer_repository::opensearch::{IndexConfig, OpenSearchClient};
///
/// let client = OpenSearchClient::new("http://localhost:9200", IndexConfig::new("catalog"))?;
/// client.recreate_index().await?;
/// client.bulk_index(&entries).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
    converter: QueryConverter,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - Name, settings and mappings of the catalog index
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchError)` - If the URL is invalid or transport setup fails
    pub fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchError> {
        let parsed_url = Url::parse(url).map_err(|e| SearchError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            index = %index_config.name,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            index_config,
            converter: QueryConverter::default(),
        })
    }

    /// Replace the query converter, e.g. to register additional handlers.
    pub fn with_converter(mut self, converter: QueryConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Name of the index this client writes to.
    pub fn index_name(&self) -> &str {
        &self.index_config.name
    }

    /// Turn a raw search hit into a [`SearchHit`].
    ///
    /// Returns `None` when the hit has no id or its source is not an entry.
    fn parse_hit(hit: &Value) -> Option<SearchHit> {
        let id = hit.get("_id")?.as_str()?.to_string();
        let source = hit.get("_source")?;
        let document: Entry = serde_json::from_value(source.clone()).ok()?;
        let score = hit.get("_score").and_then(|s| s.as_f64());

        Some(SearchHit {
            id,
            score,
            document,
        })
    }

    /// Build a [`SearchResponse`] from a raw `_search` response body.
    fn parse_search_response(body: &Value) -> Result<SearchResponse, SearchError> {
        let hits = body
            .get("hits")
            .ok_or_else(|| SearchError::parse("response has no hits"))?;

        let total = hits
            .get("total")
            .and_then(|t| t.get("value").or(Some(t)))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let took_ms = body.get("took").and_then(|t| t.as_u64()).unwrap_or(0);

        let raw_hits = hits
            .get("hits")
            .and_then(|h| h.as_array())
            .map(|h| h.as_slice())
            .unwrap_or_default();

        let items: Vec<SearchHit> = raw_hits
            .iter()
            .filter_map(|hit| {
                let parsed = Self::parse_hit(hit);
                if parsed.is_none() {
                    warn!(hit = %hit, "Skipping hit that is not an entry");
                }
                parsed
            })
            .collect();

        Ok(SearchResponse {
            total,
            took_ms,
            items,
        })
    }

    /// Count the failed items of a bulk response.
    ///
    /// `not_found` on deletes is not a failure.
    fn bulk_failures(body: &Value, action: &str) -> Vec<String> {
        if !body.get("errors").and_then(|e| e.as_bool()).unwrap_or(false) {
            return Vec::new();
        }

        body.get("items")
            .and_then(|i| i.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get(action))
                    .filter(|result| {
                        let not_found = result.get("status").and_then(|s| s.as_u64()) == Some(404);
                        result.get("error").is_some() && !(action == "delete" && not_found)
                    })
                    .map(|result| {
                        let id = result.get("_id").and_then(|i| i.as_str()).unwrap_or("?");
                        let reason = result
                            .get("error")
                            .and_then(|e| e.get("reason"))
                            .and_then(|r| r.as_str())
                            .unwrap_or("unknown");
                        format!("{}: {}", id, reason)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fail with the response body unless the status is a success or one of
    /// the tolerated codes.
    async fn check_status(
        response: Response,
        tolerated: &[u16],
        make_error: fn(String) -> SearchError,
        operation: &str,
    ) -> Result<Response, SearchError> {
        let status = response.status_code();
        if status.is_success() || tolerated.contains(&status.as_u16()) {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, operation, "Request failed");
        Err(make_error(format!(
            "{} failed with status {}: {}",
            operation, status, error_body
        )))
    }

    async fn send_bulk(
        &self,
        body: Vec<JsonBody<Value>>,
        action: &str,
        make_error: fn(String) -> SearchError,
    ) -> Result<(), SearchError> {
        let response = self
            .client
            .bulk(BulkParts::Index(&self.index_config.name))
            .body(body)
            .send()
            .await
            .map_err(|e| make_error(e.to_string()))?;

        let response = Self::check_status(response, &[], make_error, "Bulk request").await?;

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        let failures = Self::bulk_failures(&response_body, action);
        if !failures.is_empty() {
            error!(failed = failures.len(), first = %failures[0], "Bulk request had failures");
            return Err(make_error(format!(
                "{} {} operations failed, first: {}",
                failures.len(),
                action,
                failures[0]
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl SearchEngineClient for OpenSearchClient {
    #[instrument(skip(self, query), fields(index = %self.index_config.name))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let body = build_search_body(query, &self.index_config.name, &self.converter)?;

        debug!(body = %body, "Executing search");

        let response = self
            .client
            .search(SearchParts::Index(&[&self.index_config.name]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::query(e.to_string()))?;

        let response = Self::check_status(response, &[], SearchError::QueryError, "Search").await?;

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        let result = Self::parse_search_response(&response_body)?;
        debug!(total = result.total, returned = result.items.len(), "Search completed");
        Ok(result)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn bulk_index(&self, entries: &[Entry]) -> Result<(), SearchError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(entries.len() * 2);
        for entry in entries {
            let document =
                serde_json::to_value(entry).map_err(|e| SearchError::bulk_index(e.to_string()))?;
            body.push(json!({ "index": { "_id": entry.id() } }).into());
            body.push(document.into());
        }

        self.send_bulk(body, "index", SearchError::BulkIndexError)
            .await?;

        debug!(count = entries.len(), "Entries indexed");
        Ok(())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn bulk_delete(&self, ids: &[EntryId]) -> Result<(), SearchError> {
        if ids.is_empty() {
            return Ok(());
        }

        let body: Vec<JsonBody<Value>> = ids
            .iter()
            .map(|id| json!({ "delete": { "_id": id } }).into())
            .collect();

        self.send_bulk(body, "delete", SearchError::DeleteError)
            .await?;

        debug!(count = ids.len(), "Entries deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(index = %self.index_config.name))]
    async fn recreate_index(&self) -> Result<(), SearchError> {
        let name = self.index_config.name.as_str();
        let indices = self.client.indices();

        // Missing index on first start.
        let response = indices
            .delete(IndicesDeleteParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| SearchError::index_management(e.to_string()))?;
        Self::check_status(response, &[404], SearchError::IndexManagementError, "Delete index").await?;

        let response = indices
            .create(IndicesCreateParts::Index(name))
            .body(self.index_config.creation_body())
            .send()
            .await
            .map_err(|e| SearchError::index_management(e.to_string()))?;
        Self::check_status(response, &[], SearchError::IndexManagementError, "Create index").await?;

        // Analysis settings can only be changed on a closed index.
        let response = indices
            .close(IndicesCloseParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| SearchError::index_management(e.to_string()))?;
        Self::check_status(response, &[], SearchError::IndexManagementError, "Close index").await?;

        let response = indices
            .put_settings(IndicesPutSettingsParts::Index(&[name]))
            .body(self.index_config.settings())
            .send()
            .await
            .map_err(|e| SearchError::index_management(e.to_string()))?;
        Self::check_status(response, &[], SearchError::IndexManagementError, "Put settings").await?;

        let response = indices
            .put_mapping(IndicesPutMappingParts::Index(&[name]))
            .body(self.index_config.mapping())
            .send()
            .await
            .map_err(|e| SearchError::index_management(e.to_string()))?;
        Self::check_status(response, &[], SearchError::IndexManagementError, "Put mapping").await?;

        let response = indices
            .open(IndicesOpenParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| SearchError::index_management(e.to_string()))?;
        Self::check_status(response, &[], SearchError::IndexManagementError, "Open index").await?;

        info!(index = %name, "Index recreated");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        let status = health
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");

        debug!(status = %status, "OpenSearch cluster health");
        Ok(status == "green" || status == "yellow")
    }
}
