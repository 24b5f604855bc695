//! # Catalog Indexer Repository
//!
//! This crate provides traits and implementations for the two backends of
//! the indexer: the identity store holding snapshot sets and entry records,
//! and the search engine. It includes definitions for errors, interfaces,
//! in-memory and SQLite stores and a concrete implementation for OpenSearch.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod sqlite;
pub mod types;

pub use errors::{QueryConversionError, SearchError, StoreError};
pub use interfaces::{IdentityStore, SearchEngineClient};
pub use memory::MemoryStore;
pub use opensearch::{IndexConfig, OpenSearchClient, QueryConverter};
pub use sqlite::SqliteStore;
pub use types::{StoreTransaction, TransactionOp};
