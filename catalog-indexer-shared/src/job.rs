//! Indexing jobs and per-worker progress.

use serde::{Deserialize, Serialize};
use std::ops::Add;
use uuid::Uuid;

use crate::entry::EntryId;

/// What an [`IndexJob`] does with its identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobOperation {
    /// Upsert the entry records into the search engine.
    Index,
    /// Delete the documents from the search engine.
    Remove,
}

/// A batch of identities claimed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexJob {
    /// Unique job id.
    pub id: Uuid,
    /// Operation applied to every identity of the batch.
    pub operation: JobOperation,
    /// The claimed identities.
    pub ids: Vec<EntryId>,
    /// Set once the search engine acknowledged the batch.
    pub finished: bool,
}

impl IndexJob {
    /// Create a new unfinished job.
    pub fn new(operation: JobOperation, ids: Vec<EntryId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            ids,
            finished: false,
        }
    }

    /// Mark the job as acknowledged.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Number of identities in the batch.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Progress counters reported by a worker.
///
/// Counters are cumulative for the worker; combining the states of several
/// workers sums them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerState {
    /// Entries upserted into the search engine.
    pub added_entries: u64,
    /// Entries deleted from the search engine.
    pub removed_entries: u64,
}

impl WorkerState {
    /// Total entries processed.
    pub fn processed(&self) -> u64 {
        self.added_entries + self.removed_entries
    }

    /// Sum the states of all workers. Slots without a report count as zero.
    pub fn combine<'a>(states: impl IntoIterator<Item = &'a Option<WorkerState>>) -> WorkerState {
        states
            .into_iter()
            .flatten()
            .fold(WorkerState::default(), |acc, state| acc + *state)
    }
}

impl Add for WorkerState {
    type Output = WorkerState;

    fn add(self, rhs: WorkerState) -> WorkerState {
        WorkerState {
            added_entries: self.added_entries + rhs.added_entries,
            removed_entries: self.removed_entries + rhs.removed_entries,
        }
    }
}
