//! Orchestrator module for the indexing pipeline.
//!
//! Runs the state machine
//! `waiting → parseFeed → createDelta → indexDelta → finalize → waiting`
//! and publishes its status through a watch channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info, instrument, warn};

use crate::cancellation::CancellationToken;
use crate::coordinator::{CoordinatorConfig, WorkerCoordinator};
use crate::delta::{Delta, DeltaComputer};
use crate::errors::PipelineError;
use crate::parser::{FeedParser, ParseCommand, ParserConfig};
use crate::protocol::UnitEvent;
use crate::throttle::{ProgressThrottle, DEFAULT_PUBLISH_INTERVAL};
use catalog_indexer_repository::{IdentityStore, SearchEngineClient, StoreTransaction};
use catalog_indexer_shared::{IndexerStatus, ParseProgress, SnapshotKeys, Step, WorkerState};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Store key layout.
    pub keys: SnapshotKeys,
    /// Feed parser settings.
    pub parser: ParserConfig,
    /// Worker pool settings.
    pub coordinator: CoordinatorConfig,
    /// Minimum interval between two parser progress publications.
    pub publish_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            keys: SnapshotKeys::default(),
            parser: ParserConfig::default(),
            coordinator: CoordinatorConfig::default(),
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Entry lines parsed from the feed.
    pub entries: u64,
    /// Computed delta.
    pub delta: Delta,
    /// Whether the run indexed into a freshly created index.
    pub full_index: bool,
}

/// Request to run one indexing pass.
#[derive(Debug)]
pub struct RunRequest {
    /// Feed file to index.
    pub feed: PathBuf,
    /// Receives the outcome of the run.
    pub reply: oneshot::Sender<Result<RunSummary, PipelineError>>,
}

/// Orchestrator that sequences parsing, delta computation, indexing and
/// commit.
///
/// Runs are strictly sequential. A failed run leaves the current snapshot
/// untouched; the next run starts over from the feed.
pub struct IndexingOrchestrator {
    store: Arc<dyn IdentityStore>,
    search: Arc<dyn SearchEngineClient>,
    parser: Arc<FeedParser>,
    delta: DeltaComputer,
    coordinator: WorkerCoordinator,
    keys: SnapshotKeys,
    publish_interval: Duration,
    status: watch::Sender<IndexerStatus>,
}

impl IndexingOrchestrator {
    /// Create a new orchestrator with the given backends.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        search: Arc<dyn SearchEngineClient>,
        config: OrchestratorConfig,
    ) -> Self {
        let keys = config.keys;
        let (status, _) = watch::channel(IndexerStatus::default());

        Self {
            parser: Arc::new(FeedParser::new(
                store.clone(),
                keys.entry_map.clone(),
                config.parser,
            )),
            delta: DeltaComputer::new(store.clone(), keys.clone()),
            coordinator: WorkerCoordinator::new(
                store.clone(),
                search.clone(),
                keys.clone(),
                config.coordinator,
            ),
            store,
            search,
            keys,
            publish_interval: config.publish_interval,
            status,
        }
    }

    /// Subscribe to status updates.
    pub fn subscribe(&self) -> watch::Receiver<IndexerStatus> {
        self.status.subscribe()
    }

    /// The latest published status.
    pub fn status(&self) -> IndexerStatus {
        self.status.borrow().clone()
    }

    /// Run one indexing pass over `feed`.
    ///
    /// Always returns to `waiting`, whether the run succeeded or not.
    #[instrument(skip(self, feed), fields(feed = %feed.display()))]
    pub async fn run(&self, feed: &Path) -> Result<RunSummary, PipelineError> {
        let token = CancellationToken::new();
        let result = self.run_steps(feed, &token).await;

        match &result {
            Ok(summary) => info!(
                entries = summary.entries,
                added = summary.delta.added,
                removed = summary.delta.removed,
                full_index = summary.full_index,
                "Indexing run complete"
            ),
            Err(e) => {
                token.cancel();
                error!(error = %e, "Indexing run failed");
            }
        }

        self.enter(Step::Waiting);
        result
    }

    /// Serve run requests one at a time until shutdown or until the request
    /// channel closes.
    pub async fn serve(
        &self,
        mut requests: mpsc::Receiver<RunRequest>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Orchestrator waiting for run requests");

        loop {
            tokio::select! {
                request = requests.recv() => {
                    let Some(RunRequest { feed, reply }) = request else {
                        info!("Run request channel closed");
                        break;
                    };

                    let result = self.run(&feed).await;
                    if reply.send(result).is_err() {
                        warn!(feed = %feed.display(), "Run requester went away before the result");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        info!("Orchestrator shutdown complete");
    }

    async fn run_steps(
        &self,
        feed: &Path,
        token: &CancellationToken,
    ) -> Result<RunSummary, PipelineError> {
        let entries = self.parse_feed(feed, token).await?;
        let (delta, full_index) = self.create_delta().await?;
        self.index_delta(delta, token).await?;
        self.finalize().await?;

        Ok(RunSummary {
            entries,
            delta,
            full_index,
        })
    }

    /// Parse the feed into the staged snapshot in a separate parser task.
    async fn parse_feed(
        &self,
        feed: &Path,
        token: &CancellationToken,
    ) -> Result<u64, PipelineError> {
        self.enter(Step::ParseFeed);

        let mut parser = self.parser.clone().spawn(token.clone());
        parser.send_command(ParseCommand {
            file: feed.to_path_buf(),
            entries_key: self.keys.staged_entries.clone(),
            timestamp_key: self.keys.staged_timestamp.clone(),
        })?;

        let mut throttle = ProgressThrottle::new(self.publish_interval);
        let mut last = ParseProgress::default();

        while let Some(event) = parser.recv().await {
            match event {
                UnitEvent::State(progress) => {
                    last = progress;
                    if throttle.ready() {
                        self.publish_parse_progress(progress);
                    }
                }
                UnitEvent::Done => {
                    self.publish_parse_progress(last);
                    return Ok(last.entries);
                }
                UnitEvent::Error(e) => return Err(e.into()),
            }
        }

        Err(PipelineError::channel("parser exited without reporting"))
    }

    /// Diff the staged snapshot against the current one, recreating the
    /// search index first when there is no current snapshot.
    async fn create_delta(&self) -> Result<(Delta, bool), PipelineError> {
        self.enter(Step::CreateDelta);

        let base = self.delta.baseline().await?;
        let full_index = base == self.keys.empty_baseline;
        if full_index {
            info!("No current snapshot, recreating search index for a full index");
            self.search.recreate_index().await?;
        }

        let delta = self.delta.compute(&self.keys.staged_entries, base).await?;

        self.status.send_modify(|status| {
            status.added_entries = Some(delta.added);
            status.removed_entries = Some(delta.removed);
        });

        Ok((delta, full_index))
    }

    async fn index_delta(
        &self,
        delta: Delta,
        token: &CancellationToken,
    ) -> Result<WorkerState, PipelineError> {
        self.enter(Step::IndexDelta);

        let total = delta.total();
        self.coordinator
            .run(token, |state| {
                self.status.send_modify(|status| {
                    status.added_entries = Some(state.added_entries);
                    status.removed_entries = Some(state.removed_entries);
                    status.progress = Some(if total == 0 {
                        1.0
                    } else {
                        state.processed() as f64 / total as f64
                    });
                });
            })
            .await
    }

    /// Commit the staged snapshot as current in one store transaction, then
    /// drop entry records that are not part of it.
    async fn finalize(&self) -> Result<(), PipelineError> {
        self.enter(Step::Finalize);

        let transaction = StoreTransaction::new()
            .rename(&self.keys.staged_entries, &self.keys.current_entries)
            .rename(&self.keys.staged_timestamp, &self.keys.current_timestamp)
            .delete(&self.keys.added_entries)
            .delete(&self.keys.removed_entries);

        self.store.exec(transaction).await?;
        info!("Staged snapshot committed as current");

        // The commit already happened; leftovers are pruned by the next run.
        match self
            .store
            .map_retain(&self.keys.entry_map, &self.keys.current_entries)
            .await
        {
            Ok(0) => {}
            Ok(pruned) => info!(pruned = pruned, "Pruned entry records outside the current snapshot"),
            Err(e) => warn!(error = %e, "Failed to prune entry records"),
        }
        Ok(())
    }

    fn enter(&self, step: Step) {
        info!(step = %step, "Entering step");
        self.status.send_replace(IndexerStatus::at(step));
    }

    fn publish_parse_progress(&self, progress: ParseProgress) {
        self.status.send_modify(|status| {
            status.entries = Some(progress.entries);
            status.progress = Some(progress.progress);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ParseError, WorkerError};
    use crate::testing::MockSearchClient;
    use catalog_indexer_repository::MemoryStore;
    use serde_json::json;
    use catalog_indexer_shared::Entry;
    use std::collections::{HashMap, HashSet};
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use tempfile::NamedTempFile;

    fn row(title: &str, size: &str) -> serde_json::Value {
        json!([
            "ARD", "Tatort", title, "01.02.2020", "20:15:00", "01:30:00", size, "",
            "http://example.com/v.mp4", "", "", "", "", "", "", "", "1580588100"
        ])
    }

    fn feed_file(titles: &[&str]) -> NamedTempFile {
        let rows: Vec<_> = titles.iter().map(|title| row(title, "900")).collect();
        feed_with_rows(&rows)
    }

    fn feed_with_rows(rows: &[serde_json::Value]) -> NamedTempFile {
        let mut feed = String::from(
            r#"{"Filmliste":["Localized","01.02.2020, 03:04","3","MSearch","hash"],"Filmliste":["Sender","Thema","Titel"]"#,
        );
        for row in rows {
            feed.push_str(",\"X\":");
            feed.push_str(&row.to_string());
        }
        feed.push('}');

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(feed.as_bytes()).unwrap();
        file
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            keys: SnapshotKeys::with_prefix("test"),
            parser: ParserConfig {
                batch_size: 2,
                ..Default::default()
            },
            coordinator: CoordinatorConfig {
                worker_count: 2,
                batch_size: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn orchestrator(store: &Arc<MemoryStore>, search: &Arc<MockSearchClient>) -> IndexingOrchestrator {
        IndexingOrchestrator::new(store.clone(), search.clone(), config())
    }

    fn indexed_titles(search: &MockSearchClient) -> HashSet<String> {
        search
            .document_ids()
            .iter()
            .filter_map(|id| search.document(id))
            .map(|entry| entry.title)
            .collect()
    }

    #[tokio::test]
    async fn test_first_run_indexes_everything() {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(MockSearchClient::new());
        let keys = config().keys;
        let feed = feed_file(&["A", "B", "C"]);

        let summary = orchestrator(&store, &search).run(feed.path()).await.unwrap();

        assert_eq!(summary.entries, 3);
        assert_eq!(summary.delta, Delta { added: 3, removed: 0 });
        assert!(summary.full_index);
        assert_eq!(search.recreate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(indexed_titles(&search), HashSet::from(["A".into(), "B".into(), "C".into()]));

        assert_eq!(store.set_card(&keys.current_entries).await.unwrap(), 3);
        assert_eq!(
            store.get(&keys.current_timestamp).await.unwrap(),
            Some("1580526240".to_string())
        );
        for key in [
            &keys.staged_entries,
            &keys.staged_timestamp,
            &keys.added_entries,
            &keys.removed_entries,
        ] {
            assert!(!store.exists(key).await.unwrap(), "{key} should be gone");
        }
    }

    #[tokio::test]
    async fn test_second_run_applies_delta() {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(MockSearchClient::new());
        let orchestrator = orchestrator(&store, &search);

        orchestrator.run(feed_file(&["A", "B"]).path()).await.unwrap();
        let summary = orchestrator.run(feed_file(&["B", "C"]).path()).await.unwrap();

        assert_eq!(summary.delta, Delta { added: 1, removed: 1 });
        assert!(!summary.full_index);
        assert_eq!(search.recreate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(indexed_titles(&search), HashSet::from(["B".into(), "C".into()]));
        assert_eq!(store.set_card(&config().keys.current_entries).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_feed_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(MockSearchClient::new());
        let orchestrator = orchestrator(&store, &search);

        orchestrator.run(feed_file(&["A", "B"]).path()).await.unwrap();
        let calls = search.index_calls.load(Ordering::SeqCst);
        let summary = orchestrator.run(feed_file(&["B", "A"]).path()).await.unwrap();

        assert!(summary.delta.is_empty());
        assert_eq!(search.index_calls.load(Ordering::SeqCst), calls);
        assert_eq!(search.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_index_keeps_current_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let keys = config().keys;
        let healthy = Arc::new(MockSearchClient::new());

        orchestrator(&store, &healthy).run(feed_file(&["A"]).path()).await.unwrap();

        let failing = Arc::new(MockSearchClient::failing_after(0));
        let feed = feed_file(&["A", "B", "C", "D", "E"]);
        let result = orchestrator(&store, &failing).run(feed.path()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Worker {
                source: WorkerError::Search(_),
                ..
            })
        ));
        assert_eq!(store.set_card(&keys.current_entries).await.unwrap(), 1);
        assert_eq!(
            store.get(&keys.current_timestamp).await.unwrap(),
            Some("1580526240".to_string())
        );

        let summary = orchestrator(&store, &healthy).run(feed.path()).await.unwrap();
        assert_eq!(summary.delta, Delta { added: 4, removed: 0 });
        assert_eq!(store.set_card(&keys.current_entries).await.unwrap(), 5);
        assert_eq!(indexed_titles(&healthy).len(), 5);
    }

    #[tokio::test]
    async fn test_missing_feed_returns_to_waiting() {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(MockSearchClient::new());
        let orchestrator = orchestrator(&store, &search);

        let result = orchestrator.run(Path::new("/nonexistent/feed.json")).await;

        assert!(matches!(result, Err(PipelineError::Parse(ParseError::Io(_)))));
        assert_eq!(orchestrator.status(), IndexerStatus::at(Step::Waiting));
        assert_eq!(search.recreate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_status_replaced_on_step_and_merged_on_progress() {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(MockSearchClient::new());
        let orchestrator = orchestrator(&store, &search);
        let mut rx = orchestrator.subscribe();

        orchestrator.enter(Step::ParseFeed);
        orchestrator.publish_parse_progress(ParseProgress {
            entries: 10,
            progress: 0.5,
        });
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            IndexerStatus {
                step: Step::ParseFeed,
                entries: Some(10),
                progress: Some(0.5),
                ..Default::default()
            }
        );

        orchestrator.enter(Step::CreateDelta);
        assert_eq!(*rx.borrow_and_update(), IndexerStatus::at(Step::CreateDelta));
    }

    #[tokio::test]
    async fn test_run_reports_steps_in_order() {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(MockSearchClient::new());
        let orchestrator = orchestrator(&store, &search);
        let mut rx = orchestrator.subscribe();

        let observer = tokio::spawn(async move {
            let mut steps = vec![rx.borrow_and_update().step];
            while rx.changed().await.is_ok() {
                let step = rx.borrow_and_update().step;
                if steps.last() != Some(&step) {
                    steps.push(step);
                }
            }
            steps
        });

        orchestrator.run(feed_file(&["A", "B"]).path()).await.unwrap();
        assert_eq!(orchestrator.status().step, Step::Waiting);
        drop(orchestrator);

        let steps = observer.await.unwrap();
        let order = [
            Step::Waiting,
            Step::ParseFeed,
            Step::CreateDelta,
            Step::IndexDelta,
            Step::Finalize,
            Step::Waiting,
        ];
        let mut expected = order.iter();
        assert!(
            steps.iter().all(|step| expected.any(|e| e == step)),
            "steps out of order: {steps:?}"
        );
        assert_eq!(steps.last(), Some(&Step::Waiting));
    }

    #[tokio::test]
    async fn test_serve_handles_requests_until_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(MockSearchClient::new());
        let orchestrator = Arc::new(orchestrator(&store, &search));
        let (request_tx, request_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let server = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.serve(request_rx, shutdown_rx).await })
        };

        let feed = feed_file(&["A"]);
        let (reply, result) = oneshot::channel();
        request_tx
            .send(RunRequest {
                feed: feed.path().to_path_buf(),
                reply,
            })
            .await
            .unwrap();

        let summary = result.await.unwrap().unwrap();
        assert_eq!(summary.delta.added, 1);

        shutdown_tx.send(()).unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_prunes_records_of_failed_runs() {
        let store = Arc::new(MemoryStore::new());
        let keys = config().keys;

        let failing = Arc::new(MockSearchClient::failing_after(0));
        let result = orchestrator(&store, &failing)
            .run(feed_file(&["A", "B", "C", "D", "E"]).path())
            .await;
        assert!(result.is_err());

        let staged = store.set_members(&keys.staged_entries).await.unwrap();
        assert_eq!(staged.len(), 5);

        let healthy = Arc::new(MockSearchClient::new());
        orchestrator(&store, &healthy)
            .run(feed_file(&["A"]).path())
            .await
            .unwrap();

        let records = store.map_get_many(&keys.entry_map, &staged).await.unwrap();
        let kept: Vec<Entry> = records.into_iter().flatten().collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "A");
        assert_eq!(store.set_card(&keys.current_entries).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_oversized_row_numbers_are_indexed_as_zero() {
        let store = Arc::new(MemoryStore::new());
        let search = Arc::new(MockSearchClient::new());
        let feed = feed_with_rows(&[row("Riesig", "20000000000000"), row("Normal", "850.5")]);

        let summary = orchestrator(&store, &search).run(feed.path()).await.unwrap();

        assert_eq!(summary.delta.added, 2);
        let sizes: HashMap<String, u64> = search
            .document_ids()
            .iter()
            .filter_map(|id| search.document(id))
            .map(|entry| (entry.title, entry.size))
            .collect();
        assert_eq!(sizes["Riesig"], 0);
        assert_eq!(sizes["Normal"], 850 * 1024 * 1024);
    }
}
