//! Environment-driven settings for the indexer.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::IndexingError;
use catalog_indexer_pipeline::coordinator::{DEFAULT_INDEX_BATCH_SIZE, DEFAULT_WORKER_COUNT};
use catalog_indexer_pipeline::parser::{DEFAULT_BLACKLISTED_TITLE, DEFAULT_PARSE_BATCH_SIZE};
use catalog_indexer_pipeline::{CoordinatorConfig, OrchestratorConfig, ParserConfig};
use catalog_indexer_repository::opensearch::DEFAULT_INDEX_NAME;
use catalog_indexer_repository::IndexConfig;
use catalog_indexer_shared::snapshot::DEFAULT_KEY_PREFIX;
use catalog_indexer_shared::SnapshotKeys;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default identity store database file.
const DEFAULT_STORE_PATH: &str = "catalog-indexer.db";

/// `STORE_PATH` value selecting the in-process store.
pub const IN_MEMORY_STORE: &str = ":memory:";

/// Separator between titles in `TITLE_BLACKLIST`.
const TITLE_SEPARATOR: char = '|';

/// Settings of one indexer process.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub opensearch_url: String,
    pub index_name: String,
    pub key_prefix: String,
    pub worker_count: usize,
    pub index_batch_size: usize,
    pub parse_batch_size: usize,
    pub title_blacklist: HashSet<String>,
    /// Feed to index when none is given on the command line.
    pub feed_file: Option<PathBuf>,
    /// Identity store database, or [`IN_MEMORY_STORE`].
    pub store_path: PathBuf,
    /// Re-index the feed at this interval instead of running once.
    pub update_interval: Option<Duration>,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_NAME`: Search index name (default: catalog)
    /// - `KEY_PREFIX`: Prefix of all store keys (default: catalogIndexer)
    /// - `WORKER_COUNT`: Index workers per run (default: 4)
    /// - `INDEX_BATCH_SIZE`: Identities claimed per worker job (default: 100)
    /// - `PARSE_BATCH_SIZE`: Entries per parser flush (default: 500)
    /// - `TITLE_BLACKLIST`: `|`-separated titles to drop while parsing
    /// - `FEED_FILE`: Feed file to index
    /// - `STORE_PATH`: Identity store database file, `:memory:` for a
    ///   non-persistent store (default: catalog-indexer.db)
    /// - `UPDATE_INTERVAL_SECS`: Keep running and re-index at this interval
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IndexingError> {
        let title_blacklist = match lookup("TITLE_BLACKLIST") {
            Some(titles) => titles
                .split(TITLE_SEPARATOR)
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .map(str::to_string)
                .collect(),
            None => HashSet::from([DEFAULT_BLACKLISTED_TITLE.to_string()]),
        };

        Ok(Self {
            opensearch_url: lookup("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            index_name: lookup("INDEX_NAME").unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            key_prefix: lookup("KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            worker_count: parse_count("WORKER_COUNT", lookup("WORKER_COUNT"), DEFAULT_WORKER_COUNT)?,
            index_batch_size: parse_count(
                "INDEX_BATCH_SIZE",
                lookup("INDEX_BATCH_SIZE"),
                DEFAULT_INDEX_BATCH_SIZE,
            )?,
            parse_batch_size: parse_count(
                "PARSE_BATCH_SIZE",
                lookup("PARSE_BATCH_SIZE"),
                DEFAULT_PARSE_BATCH_SIZE,
            )?,
            title_blacklist,
            feed_file: lookup("FEED_FILE").map(PathBuf::from),
            store_path: PathBuf::from(
                lookup("STORE_PATH").unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()),
            ),
            update_interval: lookup("UPDATE_INTERVAL_SECS")
                .map(|secs| parse_count("UPDATE_INTERVAL_SECS", Some(secs), 0))
                .transpose()?
                .map(|secs| Duration::from_secs(secs as u64)),
        })
    }

    /// Index settings for the search client.
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::new(&self.index_name)
    }

    /// Whether the identity store lives only in this process.
    pub fn in_memory_store(&self) -> bool {
        self.store_path.as_os_str() == IN_MEMORY_STORE
    }

    /// Pipeline configuration derived from these settings.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            keys: SnapshotKeys::with_prefix(&self.key_prefix),
            parser: ParserConfig {
                batch_size: self.parse_batch_size,
                title_blacklist: self.title_blacklist.clone(),
                ..Default::default()
            },
            coordinator: CoordinatorConfig {
                worker_count: self.worker_count,
                batch_size: self.index_batch_size,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn parse_count(name: &str, value: Option<String>, default: usize) -> Result<usize, IndexingError> {
    let Some(value) = value else {
        return Ok(default);
    };

    match value.trim().parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(IndexingError::config(format!(
            "{} must be a positive integer, got '{}'",
            name, value
        ))),
    }
}
