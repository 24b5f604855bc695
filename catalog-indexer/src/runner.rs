//! Long-lived mode: re-index the same feed at a fixed interval.
//!
//! Drives [`IndexingOrchestrator::serve`] with one [`RunRequest`] per tick.
//! A failed run is logged and the next tick tries again; the identity store
//! carries the committed snapshot from one run to the next.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use catalog_indexer_pipeline::{IndexingOrchestrator, RunRequest};

/// Index `feed` now and then every `every` until `stop` resolves.
///
/// A run still in progress when `stop` resolves is abandoned without
/// committing its staged snapshot. Returns the number of successful runs.
pub async fn run_periodically(
    orchestrator: Arc<IndexingOrchestrator>,
    feed: PathBuf,
    every: Duration,
    stop: impl Future<Output = ()>,
) -> u64 {
    let (request_tx, request_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let server = tokio::spawn(async move { orchestrator.serve(request_rx, shutdown_rx).await });

    let mut ticks = tokio::time::interval(every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(stop);

    info!(feed = %feed.display(), every_secs = every.as_secs_f64(), "Starting periodic indexing");

    let mut completed: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticks.tick() => {}
        }

        let (reply, result) = oneshot::channel();
        let request = RunRequest {
            feed: feed.clone(),
            reply,
        };
        if request_tx.send(request).await.is_err() {
            error!("Orchestrator stopped serving run requests");
            break;
        }

        tokio::select! {
            _ = &mut stop => {
                warn!("Stopping during a run, staged snapshot is not committed");
                server.abort();
                return completed;
            }
            outcome = result => match outcome {
                Ok(Ok(summary)) => {
                    completed += 1;
                    info!(
                        run = completed,
                        entries = summary.entries,
                        added = summary.delta.added,
                        removed = summary.delta.removed,
                        full_index = summary.full_index,
                        "Catalog indexed"
                    );
                }
                Ok(Err(e)) => error!(error = %e, "Indexing run failed, retrying on the next tick"),
                Err(_) => {
                    error!("Orchestrator dropped the run request");
                    break;
                }
            },
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = server.await {
        warn!(error = %e, "Orchestrator task ended abnormally");
    }

    info!(runs = completed, "Periodic indexing stopped");
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dependencies, Settings};
    use async_trait::async_trait;
    use catalog_indexer_repository::{
        IdentityStore, SearchEngineClient, SearchError, SqliteStore,
    };
    use catalog_indexer_shared::{Entry, EntryId, SearchQuery, SearchResponse};
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::NamedTempFile;

    #[derive(Default)]
    struct CountingSearchClient {
        index_calls: AtomicUsize,
        recreate_calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchEngineClient for CountingSearchClient {
        async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SearchError> {
            Ok(SearchResponse::empty())
        }

        async fn bulk_index(&self, _entries: &[Entry]) -> Result<(), SearchError> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn bulk_delete(&self, _ids: &[EntryId]) -> Result<(), SearchError> {
            Ok(())
        }

        async fn recreate_index(&self) -> Result<(), SearchError> {
            self.recreate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn health_check(&self) -> Result<bool, SearchError> {
            Ok(true)
        }
    }

    fn feed_file(titles: &[&str]) -> NamedTempFile {
        let mut feed = String::from(
            r#"{"Filmliste":["Localized","01.02.2020, 03:04","3","MSearch","hash"],"Filmliste":["Sender","Thema","Titel"]"#,
        );
        for title in titles {
            let row = serde_json::json!([
                "ARD", "Tatort", title, "01.02.2020", "20:15:00", "01:30:00", "900", "",
                "http://example.com/v.mp4", "", "", "", "", "", "", "", "1580588100"
            ]);
            feed.push_str(",\"X\":");
            feed.push_str(&row.to_string());
        }
        feed.push('}');

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(feed.as_bytes()).unwrap();
        file
    }

    fn settings(store_path: &std::path::Path) -> Settings {
        let vars = HashMap::from([
            ("KEY_PREFIX".to_string(), "test".to_string()),
            ("WORKER_COUNT".to_string(), "2".to_string()),
            ("STORE_PATH".to_string(), store_path.display().to_string()),
        ]);
        Settings::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_periodic_runs_are_incremental() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("store.db"));
        let search = Arc::new(CountingSearchClient::default());
        let store = Dependencies::open_store(&settings).unwrap();
        let dependencies = Dependencies::with_backends(store, search.clone(), &settings);
        let feed = feed_file(&["A", "B", "C"]);

        let runs = run_periodically(
            dependencies.orchestrator,
            feed.path().to_path_buf(),
            Duration::from_millis(20),
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await;

        assert!(runs >= 2, "only {runs} runs completed");
        assert_eq!(search.recreate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_continues_from_persisted_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("store.db"));
        let search = Arc::new(CountingSearchClient::default());

        let first = Dependencies::with_backends(
            Dependencies::open_store(&settings).unwrap(),
            search.clone(),
            &settings,
        );
        let summary = first.orchestrator.run(feed_file(&["A", "B"]).path()).await.unwrap();
        assert!(summary.full_index);
        drop(first);

        let store: Arc<dyn IdentityStore> =
            Arc::new(SqliteStore::open(&settings.store_path).unwrap());
        let second = Dependencies::with_backends(store, search.clone(), &settings);
        let summary = second.orchestrator.run(feed_file(&["B", "C"]).path()).await.unwrap();

        assert!(!summary.full_index);
        assert_eq!(summary.delta.added, 1);
        assert_eq!(summary.delta.removed, 1);
        assert_eq!(search.recreate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_before_first_tick_completes() {
        let settings = settings(std::path::Path::new(crate::config::IN_MEMORY_STORE));
        let search = Arc::new(CountingSearchClient::default());
        let store = Dependencies::open_store(&settings).unwrap();
        let dependencies = Dependencies::with_backends(store, search.clone(), &settings);

        let runs = run_periodically(
            dependencies.orchestrator,
            PathBuf::from("/nonexistent/feed.json"),
            Duration::from_secs(3600),
            std::future::ready(()),
        )
        .await;

        assert_eq!(runs, 0);
        assert_eq!(search.index_calls.load(Ordering::SeqCst), 0);
    }
}
