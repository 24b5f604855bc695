use std::env;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use catalog_indexer::{run_periodically, Dependencies, IndexingError, Settings};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv::dotenv().ok();
    init_tracing();

    let settings = Settings::from_env()?;
    let feed = env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| settings.feed_file.clone())
        .ok_or_else(|| IndexingError::config("no feed file given (argument or FEED_FILE)"))?;

    info!(feed = %feed.display(), "Starting catalog indexer");

    let dependencies = Dependencies::new(&settings).await?;
    let orchestrator = dependencies.orchestrator;

    let mut status = orchestrator.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            match serde_json::to_string(&current) {
                Ok(json) => debug!(status = %json, "Indexer status"),
                Err(e) => warn!(error = %e, "Failed to serialize indexer status"),
            }
        }
    });

    if let Some(every) = settings.update_interval {
        let stop = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for the shutdown signal");
            }
        };
        run_periodically(orchestrator, feed, every, stop).await;
        return Ok(());
    }

    tokio::select! {
        result = orchestrator.run(&feed) => {
            match result {
                Ok(summary) => {
                    info!(
                        entries = summary.entries,
                        added = summary.delta.added,
                        removed = summary.delta.removed,
                        full_index = summary.full_index,
                        "Catalog indexed"
                    );
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "Indexing failed");
                    Err(e.into())
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, staged snapshot is not committed");
            Ok(())
        }
    }
}
