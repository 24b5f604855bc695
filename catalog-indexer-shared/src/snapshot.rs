//! Store key layout for snapshots and deltas.
//!
//! All persisted indexer state lives under plain keys of the identity store.
//! A snapshot is a set of entry identities plus a timestamp key; the delta
//! between two snapshots is kept in two transient sets.

/// Default prefix for all indexer keys.
pub const DEFAULT_KEY_PREFIX: &str = "catalogIndexer";

/// Names of every key the indexer reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotKeys {
    /// Identity set of the committed snapshot.
    pub current_entries: String,
    /// Feed timestamp of the committed snapshot.
    pub current_timestamp: String,
    /// Identity set being staged by the running parse.
    pub staged_entries: String,
    /// Feed timestamp of the staged snapshot.
    pub staged_timestamp: String,
    /// Transient set: identities in the staged but not the current snapshot.
    pub added_entries: String,
    /// Transient set: identities in the current but not the staged snapshot.
    pub removed_entries: String,
    /// A key that never holds data, used as the baseline on the first run.
    pub empty_baseline: String,
    /// Map from identity to entry record.
    pub entry_map: String,
}

impl SnapshotKeys {
    /// Build the key layout under the given prefix.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            current_entries: format!("{prefix}:currentEntries"),
            current_timestamp: format!("{prefix}:currentEntriesTimestamp"),
            staged_entries: format!("{prefix}:newEntries"),
            staged_timestamp: format!("{prefix}:newEntriesTimestamp"),
            added_entries: format!("{prefix}:addedEntries"),
            removed_entries: format!("{prefix}:removedEntries"),
            empty_baseline: format!("{prefix}:none"),
            entry_map: format!("{prefix}:entries"),
        }
    }
}

impl Default for SnapshotKeys {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct() {
        let keys = SnapshotKeys::default();
        let mut all = vec![
            &keys.current_entries,
            &keys.current_timestamp,
            &keys.staged_entries,
            &keys.staged_timestamp,
            &keys.added_entries,
            &keys.removed_entries,
            &keys.empty_baseline,
            &keys.entry_map,
        ];
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn test_with_prefix() {
        let keys = SnapshotKeys::with_prefix("test");
        assert_eq!(keys.current_entries, "test:currentEntries");
        assert_eq!(keys.empty_baseline, "test:none");
    }
}
