//! Dependency initialization and wiring for the catalog indexer.

use std::sync::Arc;
use tracing::{info, warn};

use super::Settings;
use crate::IndexingError;
use catalog_indexer_pipeline::IndexingOrchestrator;
use catalog_indexer_repository::{
    IdentityStore, MemoryStore, OpenSearchClient, SearchEngineClient, SqliteStore,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Arc<IndexingOrchestrator>,
    /// Search client shared with the orchestrator, used to answer queries.
    pub search: Arc<dyn SearchEngineClient>,
}

impl Dependencies {
    /// Initialize all dependencies from settings.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If OpenSearch is unreachable or unhealthy,
    ///   or the identity store cannot be opened
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index_name = %settings.index_name,
            key_prefix = %settings.key_prefix,
            store_path = %settings.store_path.display(),
            workers = settings.worker_count,
            "Initializing dependencies"
        );

        let search_client = OpenSearchClient::new(&settings.opensearch_url, settings.index_config())
            .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        // Verify OpenSearch is reachable
        let healthy = search_client
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        let search: Arc<dyn SearchEngineClient> = Arc::new(search_client);
        let store = Self::open_store(settings)?;

        Ok(Self::with_backends(store, search, settings))
    }

    /// Open the identity store named by `STORE_PATH`.
    pub fn open_store(settings: &Settings) -> Result<Arc<dyn IdentityStore>, IndexingError> {
        if settings.in_memory_store() {
            warn!("Using the in-process identity store, every restart reindexes fully");
            return Ok(Arc::new(MemoryStore::new()));
        }

        Ok(Arc::new(SqliteStore::open(&settings.store_path)?))
    }

    /// Wire the orchestrator over already constructed backends.
    pub fn with_backends(
        store: Arc<dyn IdentityStore>,
        search: Arc<dyn SearchEngineClient>,
        settings: &Settings,
    ) -> Self {
        let orchestrator = IndexingOrchestrator::new(
            store,
            search.clone(),
            settings.orchestrator_config(),
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            search,
        }
    }
}
