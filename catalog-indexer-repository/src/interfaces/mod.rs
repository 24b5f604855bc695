//! Interface definitions for the external collaborators of the indexer.
//!
//! The `IdentityStore` holds snapshot membership and entry records; the
//! `SearchEngineClient` is the indexing and query sink. Both are traits so
//! the pipeline can be wired against in-memory or remote backends.

mod identity_store;
mod search_engine_client;

pub use identity_store::IdentityStore;
pub use search_engine_client::SearchEngineClient;
