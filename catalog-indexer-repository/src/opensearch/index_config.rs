//! OpenSearch index configuration and mappings.
//!
//! This module defines the settings and mappings of the catalog index.

use serde_json::{json, Value};

/// Default name of the search index.
pub const DEFAULT_INDEX_NAME: &str = "catalog";

/// Index name and sharding configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Name of the index documents are written to and searched in.
    pub name: String,
    /// Number of primary shards.
    pub number_of_shards: u32,
    /// Number of replicas per shard.
    pub number_of_replicas: u32,
}

impl IndexConfig {
    /// Create a configuration for the named index with a single shard.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Settings installed while the index is closed.
    ///
    /// Defines the `catalog_text` analyzer used by all full text fields:
    /// standard tokenization, lowercasing and ASCII folding so that
    /// umlauts match their transliterations.
    pub fn settings(&self) -> Value {
        json!({
            "index": {
                "number_of_replicas": self.number_of_replicas,
                "analysis": {
                    "analyzer": {
                        "catalog_text": {
                            "type": "custom",
                            "tokenizer": "standard",
                            "filter": ["lowercase", "asciifolding"]
                        }
                    }
                }
            }
        })
    }

    /// Body for index creation.
    pub fn creation_body(&self) -> Value {
        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas
            }
        })
    }

    /// Mapping of the entry document.
    ///
    /// - **channel/topic**: full text with a `raw` keyword sub-field for
    ///   term filters and sorting
    /// - **title/description**: full text
    /// - **timestamp/duration/size**: numeric, for ranges and sorting
    /// - **urls**: stored only
    pub fn mapping(&self) -> Value {
        json!({
            "properties": {
                "channel": {
                    "type": "text",
                    "analyzer": "catalog_text",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "topic": {
                    "type": "text",
                    "analyzer": "catalog_text",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "title": {
                    "type": "text",
                    "analyzer": "catalog_text",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "description": {
                    "type": "text",
                    "analyzer": "catalog_text"
                },
                "timestamp": { "type": "date", "format": "epoch_second" },
                "duration": { "type": "long" },
                "size": { "type": "long" },
                "url_website": { "type": "keyword", "index": false },
                "url_subtitle": { "type": "keyword", "index": false },
                "url_video": { "type": "keyword", "index": false },
                "url_video_low": { "type": "keyword", "index": false },
                "url_video_hd": { "type": "keyword", "index": false }
            }
        })
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_INDEX_NAME.to_string(),
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }
}
