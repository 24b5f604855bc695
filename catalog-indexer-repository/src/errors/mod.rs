//! Error types for the catalog indexer repository.

mod query_conversion_error;
mod search_error;
mod store_error;

pub use query_conversion_error::QueryConversionError;
pub use search_error::SearchError;
pub use store_error::StoreError;
