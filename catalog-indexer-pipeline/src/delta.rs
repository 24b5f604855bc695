//! Delta computation between two snapshots.
//!
//! `added = new − base` and `removed = base − new` are stored under the
//! well-known transient keys. A first run diffs against the empty baseline
//! key, which never holds a value, so a full index is just a delta whose
//! `removed` side is empty.

use std::sync::Arc;
use tracing::{info, instrument};

use catalog_indexer_repository::{IdentityStore, StoreError};
use catalog_indexer_shared::SnapshotKeys;

/// Cardinalities of a computed delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delta {
    /// Identities in the new snapshot only.
    pub added: u64,
    /// Identities in the base snapshot only.
    pub removed: u64,
}

impl Delta {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0
    }

    /// Total number of identities to apply.
    pub fn total(&self) -> u64 {
        self.added + self.removed
    }
}

/// Computes and stores snapshot deltas.
pub struct DeltaComputer {
    store: Arc<dyn IdentityStore>,
    keys: SnapshotKeys,
}

impl DeltaComputer {
    /// Create a delta computer over the given key layout.
    pub fn new(store: Arc<dyn IdentityStore>, keys: SnapshotKeys) -> Self {
        Self { store, keys }
    }

    /// Whether a committed snapshot exists.
    pub async fn has_current(&self) -> Result<bool, StoreError> {
        self.store.exists(&self.keys.current_entries).await
    }

    /// Key to diff a new snapshot against: the current snapshot, or the
    /// empty baseline when none was committed yet.
    pub async fn baseline(&self) -> Result<&str, StoreError> {
        if self.has_current().await? {
            Ok(&self.keys.current_entries)
        } else {
            Ok(&self.keys.empty_baseline)
        }
    }

    /// Diff `new_key` against `base_key` and store the result.
    #[instrument(skip(self))]
    pub async fn compute(&self, new_key: &str, base_key: &str) -> Result<Delta, StoreError> {
        let added = self
            .store
            .diff_store(&self.keys.added_entries, new_key, base_key)
            .await?;
        let removed = self
            .store
            .diff_store(&self.keys.removed_entries, base_key, new_key)
            .await?;

        let delta = Delta { added, removed };
        info!(added = added, removed = removed, "Delta computed");
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_repository::MemoryStore;
    use catalog_indexer_shared::EntryId;

    fn ids(names: &[&str]) -> Vec<EntryId> {
        names.iter().map(|n| EntryId::from_string(*n)).collect()
    }

    async fn sorted(store: &MemoryStore, key: &str) -> Vec<EntryId> {
        let mut members = store.set_members(key).await.unwrap();
        members.sort();
        members
    }

    fn setup() -> (Arc<MemoryStore>, DeltaComputer, SnapshotKeys) {
        let store = Arc::new(MemoryStore::new());
        let keys = SnapshotKeys::with_prefix("test");
        let delta = DeltaComputer::new(store.clone(), keys.clone());
        (store, delta, keys)
    }

    #[tokio::test]
    async fn test_delta_correctness() {
        let (store, delta, keys) = setup();
        store.set_add(&keys.current_entries, &ids(&["A", "B", "C"])).await.unwrap();
        store.set_add(&keys.staged_entries, &ids(&["B", "C", "D"])).await.unwrap();

        let result = delta
            .compute(&keys.staged_entries, &keys.current_entries)
            .await
            .unwrap();

        assert_eq!(result, Delta { added: 1, removed: 1 });
        assert_eq!(sorted(&store, &keys.added_entries).await, ids(&["D"]));
        assert_eq!(sorted(&store, &keys.removed_entries).await, ids(&["A"]));
    }

    #[tokio::test]
    async fn test_delta_against_itself_is_empty() {
        let (store, delta, keys) = setup();
        store.set_add(&keys.staged_entries, &ids(&["A", "B"])).await.unwrap();

        let result = delta
            .compute(&keys.staged_entries, &keys.staged_entries)
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(store.set_card(&keys.added_entries).await.unwrap(), 0);
        assert_eq!(store.set_card(&keys.removed_entries).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_first_run_uses_empty_baseline() {
        let (store, delta, keys) = setup();
        store.set_add(&keys.staged_entries, &ids(&["A", "B", "C"])).await.unwrap();

        assert!(!delta.has_current().await.unwrap());
        let base = delta.baseline().await.unwrap().to_string();
        assert_eq!(base, keys.empty_baseline);

        let result = delta.compute(&keys.staged_entries, &base).await.unwrap();

        assert_eq!(result, Delta { added: 3, removed: 0 });
        assert_eq!(
            sorted(&store, &keys.added_entries).await,
            ids(&["A", "B", "C"])
        );
    }

    #[tokio::test]
    async fn test_baseline_is_current_when_committed() {
        let (store, delta, keys) = setup();
        store.set_add(&keys.current_entries, &ids(&["A"])).await.unwrap();

        assert_eq!(delta.baseline().await.unwrap(), keys.current_entries);
    }

    #[tokio::test]
    async fn test_delta_replaces_previous_transient_sets() {
        let (store, delta, keys) = setup();
        store.set_add(&keys.added_entries, &ids(&["stale"])).await.unwrap();
        store.set_add(&keys.staged_entries, &ids(&["A"])).await.unwrap();
        store.set_add(&keys.current_entries, &ids(&["A"])).await.unwrap();

        delta
            .compute(&keys.staged_entries, &keys.current_entries)
            .await
            .unwrap();

        assert_eq!(store.set_card(&keys.added_entries).await.unwrap(), 0);
    }
}
