//! SQLite implementation of the identity store.
//!
//! Keeps the committed snapshot across process restarts, so a restarted
//! indexer continues with incremental runs instead of reindexing.

mod store;

pub use store::SqliteStore;
