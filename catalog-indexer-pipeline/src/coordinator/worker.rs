//! Indexing worker unit.
//!
//! A worker repeatedly claims a batch of identities from the shared `added`
//! set (then from the `removed` set), applies it to the search engine and
//! reports its cumulative counters, until both sets are exhausted.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cancellation::CancellationToken;
use crate::errors::WorkerError;
use crate::protocol::UnitEnd;
use catalog_indexer_repository::{IdentityStore, SearchEngineClient};
use catalog_indexer_shared::{Entry, IndexJob, JobOperation, WorkerState};

/// Initial command of a worker: which sets to drain and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAssignment {
    /// Set of identities to index.
    pub added_key: String,
    /// Set of identities to remove.
    pub removed_key: String,
    /// Map holding the entry records.
    pub entry_map_key: String,
    /// Maximum identities claimed per job.
    pub batch_size: usize,
}

/// Unit end of a worker channel.
pub type WorkerEnd = UnitEnd<WorkerAssignment, WorkerState, WorkerError>;

/// One indexing worker.
pub struct IndexWorker {
    id: usize,
    store: Arc<dyn IdentityStore>,
    search: Arc<dyn SearchEngineClient>,
    token: CancellationToken,
}

impl IndexWorker {
    /// Create a worker. `id` only identifies it in logs and reports.
    pub fn new(
        id: usize,
        store: Arc<dyn IdentityStore>,
        search: Arc<dyn SearchEngineClient>,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            store,
            search,
            token,
        }
    }

    /// Wait for the assignment, work it off and report the outcome.
    pub async fn run(self, mut unit: WorkerEnd) {
        let Some(assignment) = unit.command().await else {
            debug!(worker = self.id, "Coordinator went away before assigning work");
            return;
        };

        match self.process(&assignment, |state| unit.state(state)).await {
            Ok(state) => {
                debug!(
                    worker = self.id,
                    added = state.added_entries,
                    removed = state.removed_entries,
                    "Worker finished"
                );
                unit.done();
            }
            Err(e) => {
                warn!(worker = self.id, error = %e, "Worker failed");
                unit.error(e);
            }
        }
    }

    #[instrument(skip(self, assignment, report), fields(worker = self.id))]
    async fn process(
        &self,
        assignment: &WorkerAssignment,
        mut report: impl FnMut(WorkerState),
    ) -> Result<WorkerState, WorkerError> {
        let mut state = WorkerState::default();

        loop {
            if self.token.is_cancelled() {
                return Err(WorkerError::Cancelled);
            }

            let Some(mut job) = self.claim(assignment).await? else {
                return Ok(state);
            };

            let applied = self.execute(&job, assignment).await?;
            job.finish();

            match job.operation {
                JobOperation::Index => state.added_entries += applied,
                JobOperation::Remove => state.removed_entries += applied,
            }

            debug!(job = %job.id, operation = ?job.operation, count = applied, "Job finished");
            report(state);
        }
    }

    /// Atomically pop the next batch, preferring additions.
    async fn claim(&self, assignment: &WorkerAssignment) -> Result<Option<IndexJob>, WorkerError> {
        for (key, operation) in [
            (&assignment.added_key, JobOperation::Index),
            (&assignment.removed_key, JobOperation::Remove),
        ] {
            let ids = self.store.set_pop(key, assignment.batch_size).await?;
            if !ids.is_empty() {
                return Ok(Some(IndexJob::new(operation, ids)));
            }
        }

        Ok(None)
    }

    /// Apply a job to the search engine, returning the number of entries
    /// applied.
    async fn execute(&self, job: &IndexJob, assignment: &WorkerAssignment) -> Result<u64, WorkerError> {
        match job.operation {
            JobOperation::Index => {
                let records = self
                    .store
                    .map_get_many(&assignment.entry_map_key, &job.ids)
                    .await?;

                let entries: Vec<Entry> = records.into_iter().flatten().collect();
                let missing = job.len() - entries.len();
                if missing > 0 {
                    debug!(job = %job.id, missing = missing, "Skipping identities without record");
                }

                self.search.bulk_index(&entries).await?;
                Ok(entries.len() as u64)
            }
            JobOperation::Remove => {
                self.search.bulk_delete(&job.ids).await?;
                self.store
                    .map_remove(&assignment.entry_map_key, &job.ids)
                    .await?;
                Ok(job.len() as u64)
            }
        }
    }
}
