//! Worker coordination for the indexing step.
//!
//! The coordinator spawns a fixed number of [`IndexWorker`] units, hands
//! each one the same [`WorkerAssignment`] and supervises them over their
//! private unit channels:
//!
//! - `State` replaces the worker's slot; the sum over all slots is published
//!   at most once per publish interval
//! - `Done` counts towards the completion quorum (the worker count)
//! - `Error` cancels the run and fails the whole step

mod worker;

pub use worker::{IndexWorker, WorkerAssignment, WorkerEnd};

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, error, info, instrument};

use crate::cancellation::CancellationToken;
use crate::errors::PipelineError;
use crate::protocol::{unit_channel, UnitEvent};
use crate::throttle::{ProgressThrottle, DEFAULT_PUBLISH_INTERVAL};
use catalog_indexer_repository::{IdentityStore, SearchEngineClient};
use catalog_indexer_shared::{SnapshotKeys, WorkerState};

/// Default number of concurrent workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default number of identities per job.
pub const DEFAULT_INDEX_BATCH_SIZE: usize = 100;

/// Configuration for the worker coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of workers spawned per indexing step.
    pub worker_count: usize,
    /// Maximum identities claimed per job.
    pub batch_size: usize,
    /// Minimum interval between two aggregate publications.
    pub publish_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_INDEX_BATCH_SIZE,
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
        }
    }
}

/// Fans the delta out to a pool of workers.
pub struct WorkerCoordinator {
    store: Arc<dyn IdentityStore>,
    search: Arc<dyn SearchEngineClient>,
    keys: SnapshotKeys,
    config: CoordinatorConfig,
}

impl WorkerCoordinator {
    /// Create a coordinator draining the delta sets named by `keys`.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        search: Arc<dyn SearchEngineClient>,
        keys: SnapshotKeys,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            search,
            keys,
            config,
        }
    }

    fn assignment(&self) -> WorkerAssignment {
        WorkerAssignment {
            added_key: self.keys.added_entries.clone(),
            removed_key: self.keys.removed_entries.clone(),
            entry_map_key: self.keys.entry_map.clone(),
            batch_size: self.config.batch_size,
        }
    }

    /// Run the workers until all of them are done or one fails.
    ///
    /// `on_progress` receives the combined worker state, rate-limited, and
    /// once more with the final totals on success. On failure the token is
    /// cancelled and all workers are awaited before the error is returned.
    #[instrument(skip(self, token, on_progress), fields(workers = self.config.worker_count))]
    pub async fn run(
        &self,
        token: &CancellationToken,
        mut on_progress: impl FnMut(WorkerState),
    ) -> Result<WorkerState, PipelineError> {
        let worker_count = self.config.worker_count.max(1);
        let mut events = StreamMap::new();
        let mut tasks = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let (mut handle, unit) = unit_channel();
            let worker = IndexWorker::new(
                id,
                self.store.clone(),
                self.search.clone(),
                token.clone(),
            );

            tasks.push(tokio::spawn(worker.run(unit)));
            handle.send_command(self.assignment())?;
            events.insert(id, handle.into_stream());
        }

        info!(workers = worker_count, "Workers started");

        let mut slots: Vec<Option<WorkerState>> = vec![None; worker_count];
        let mut throttle = ProgressThrottle::new(self.config.publish_interval);
        let mut done = 0;

        let outcome = loop {
            let Some((id, event)) = events.next().await else {
                break Err(PipelineError::channel(format!(
                    "{} of {} workers exited without reporting",
                    worker_count - done,
                    worker_count
                )));
            };

            match event {
                UnitEvent::State(state) => {
                    slots[id] = Some(state);
                    if throttle.ready() {
                        on_progress(WorkerState::combine(&slots));
                    }
                }
                UnitEvent::Done => {
                    done += 1;
                    debug!(worker = id, done = done, "Worker done");
                    if done == worker_count {
                        break Ok(WorkerState::combine(&slots));
                    }
                }
                UnitEvent::Error(e) => {
                    error!(worker = id, error = %e, "Worker failed, cancelling indexing");
                    break Err(PipelineError::worker(id, e));
                }
            }
        };

        if outcome.is_err() {
            token.cancel();
        }

        // Workers finish their current batch before observing cancellation.
        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task panicked");
            }
        }

        let total = outcome?;
        on_progress(total);
        info!(
            added = total.added_entries,
            removed = total.removed_entries,
            "Indexing step complete"
        );
        Ok(total)
    }
}
