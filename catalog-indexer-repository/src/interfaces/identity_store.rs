//! Identity store trait definition.
//!
//! The identity store is the single source of truth for snapshot membership.
//! It offers named sets of entry identities, plain string keys, an
//! identity-keyed entry map and an atomic multi-key transaction used to
//! commit snapshots.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::types::StoreTransaction;
use catalog_indexer_shared::{Entry, EntryId};

/// Abstract interface for the identity/document store.
///
/// Set operations treat a missing key as an empty set. Every single call is
/// atomic with respect to concurrent callers; in particular two concurrent
/// [`set_pop`](IdentityStore::set_pop) calls never return overlapping
/// identities.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; all workers share one store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Check whether a key holds any value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Read a string key.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a string key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Create an empty set under `key`, replacing any previous value.
    async fn create_set(&self, key: &str) -> Result<(), StoreError>;

    /// Add identities to a set, returning how many were not yet members.
    async fn set_add(&self, key: &str, ids: &[EntryId]) -> Result<u64, StoreError>;

    /// Number of members of a set.
    async fn set_card(&self, key: &str) -> Result<u64, StoreError>;

    /// All members of a set, in no particular order.
    async fn set_members(&self, key: &str) -> Result<Vec<EntryId>, StoreError>;

    /// Atomically remove and return up to `count` members of a set.
    async fn set_pop(&self, key: &str, count: usize) -> Result<Vec<EntryId>, StoreError>;

    /// Store `from − minus` under `destination` and return its cardinality.
    async fn diff_store(&self, destination: &str, from: &str, minus: &str)
        -> Result<u64, StoreError>;

    /// Put entry records into the map under `key`, keyed by their identity.
    async fn map_put(&self, key: &str, entries: &[Entry]) -> Result<(), StoreError>;

    /// Fetch entry records by identity. Missing records are `None`.
    async fn map_get_many(&self, key: &str, ids: &[EntryId])
        -> Result<Vec<Option<Entry>>, StoreError>;

    /// Remove entry records by identity.
    async fn map_remove(&self, key: &str, ids: &[EntryId]) -> Result<(), StoreError>;

    /// Remove every record of the map under `key` whose identity is not a
    /// member of the set under `set_key`, returning how many were removed.
    async fn map_retain(&self, key: &str, set_key: &str) -> Result<u64, StoreError>;

    /// Execute all operations of a transaction, or none of them.
    async fn exec(&self, transaction: StoreTransaction) -> Result<(), StoreError>;
}
