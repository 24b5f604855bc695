//! OpenSearch implementation of the search engine client.
//!
//! This module provides a concrete implementation of `SearchEngineClient`
//! using OpenSearch as the backend, plus the query converter that compiles
//! abstract queries into OpenSearch query DSL.

mod client;
pub mod converter;
mod index_config;
mod queries;

pub use client::OpenSearchClient;
pub use converter::{ConvertHandler, ConvertResult, QueryConverter};
pub use index_config::{IndexConfig, DEFAULT_INDEX_NAME};
pub use queries::{build_search_body, DEFAULT_LIMIT, MAX_LIMIT};
