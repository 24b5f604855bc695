//! Streaming feed parser.
//!
//! Turns a feed file into a staged snapshot: the identity of every entry is
//! added to the staged set, its record is written to the shared entry map
//! and the feed timestamp is stored under the staged timestamp key.
//!
//! The parser runs as its own task and reports to the orchestrator over a
//! unit channel (see [`crate::protocol`]).

mod reader;
mod row;

pub use reader::{FeedLine, FeedReader};
pub use row::{
    apply_url_patch, map_row, parse_duration, parse_metadata_timestamp, parse_size, RowCarry,
};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tracing::{debug, error, info, instrument};

use crate::cancellation::CancellationToken;
use crate::errors::ParseError;
use crate::protocol::{unit_channel, UnitHandle};
use crate::retry::{retry_until_cancelled, DEFAULT_RETRY_DELAY};
use catalog_indexer_repository::{IdentityStore, StoreError};
use catalog_indexer_shared::{Entry, EntryId, ParseProgress};

/// Default number of entries written to the store at once.
pub const DEFAULT_PARSE_BATCH_SIZE: usize = 500;

/// Title dropped by default.
pub const DEFAULT_BLACKLISTED_TITLE: &str = "Wir haben genug - Wirtschaft ohne Wachstum";

/// Configuration for the feed parser.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Number of entries buffered before they are written to the store.
    pub batch_size: usize,
    /// Entries with one of these exact titles are dropped.
    pub title_blacklist: HashSet<String>,
    /// Delay between two attempts of a failed store write.
    pub retry_delay: Duration,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_PARSE_BATCH_SIZE,
            title_blacklist: HashSet::from([DEFAULT_BLACKLISTED_TITLE.to_string()]),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Where a parse writes its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommand {
    /// The feed file.
    pub file: PathBuf,
    /// Set receiving the entry identities.
    pub entries_key: String,
    /// Key receiving the feed timestamp.
    pub timestamp_key: String,
}

/// Parser unit handle as seen by the orchestrator.
pub type ParserHandle = UnitHandle<ParseCommand, ParseProgress, ParseError>;

/// Parser for catalog feeds.
pub struct FeedParser {
    store: Arc<dyn IdentityStore>,
    entry_map_key: String,
    config: ParserConfig,
}

impl FeedParser {
    /// Create a parser writing records to the map under `entry_map_key`.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        entry_map_key: impl Into<String>,
        config: ParserConfig,
    ) -> Self {
        Self {
            store,
            entry_map_key: entry_map_key.into(),
            config,
        }
    }

    /// Start the parser as a separate task.
    ///
    /// The task waits for a [`ParseCommand`] on the returned handle, reports
    /// [`ParseProgress`] while parsing and ends with `Done` or `Error`.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> ParserHandle {
        let (handle, mut unit) = unit_channel();

        tokio::spawn(async move {
            let Some(command) = unit.command().await else {
                debug!("Parser handle dropped before a command was sent");
                return;
            };

            match self.parse(&command, &token, |progress| unit.state(progress)).await {
                Ok(entries) => {
                    info!(entries = entries, file = %command.file.display(), "Feed parsed");
                    unit.done();
                }
                Err(e) => {
                    error!(error = %e, file = %command.file.display(), "Failed to parse feed");
                    unit.error(e);
                }
            }
        });

        handle
    }

    /// Parse a feed file into the staged snapshot named by `command`.
    ///
    /// Calls `on_progress` after every flushed batch and once more with a
    /// progress of `1.0` at the end. Returns the number of entry lines read.
    #[instrument(skip(self, token, on_progress), fields(file = %command.file.display()))]
    pub async fn parse(
        &self,
        command: &ParseCommand,
        token: &CancellationToken,
        mut on_progress: impl FnMut(ParseProgress) + Send,
    ) -> Result<u64, ParseError> {
        let file = File::open(&command.file).await?;
        let total_bytes = file.metadata().await?.len();

        self.reset_staging(command).await?;

        let mut reader = FeedReader::new(file);

        match reader.next_line().await? {
            Some(FeedLine::Line(_)) => {}
            _ => return Err(ParseError::metadata("feed ended before the metadata line")),
        }

        let timestamp = match reader.next_line().await? {
            Some(FeedLine::Line(line)) | Some(FeedLine::Terminal(line)) => {
                parse_metadata_timestamp(&line)?
            }
            None => return Err(ParseError::metadata("feed ended before the metadata line")),
        };

        let timestamp_value = timestamp.to_string();
        self.with_retry(token, || {
            self.store.set(&command.timestamp_key, &timestamp_value)
        })
        .await?;
        debug!(timestamp = timestamp, "Stored feed timestamp");

        let mut carry = RowCarry::default();
        let mut buffer: Vec<Entry> = Vec::with_capacity(self.config.batch_size);
        let mut lines: u64 = 0;
        let mut skipped: u64 = 0;

        while let Some(FeedLine::Line(line)) = reader.next_line().await? {
            lines += 1;

            let entry = map_row(&line, lines, &mut carry)?;
            if self.config.title_blacklist.contains(&entry.title) {
                skipped += 1;
                continue;
            }

            buffer.push(entry);

            if buffer.len() >= self.config.batch_size {
                if token.is_cancelled() {
                    return Err(ParseError::Cancelled);
                }

                self.flush(command, &mut buffer, token).await?;
                on_progress(ParseProgress {
                    entries: lines,
                    progress: fraction(reader.bytes_read(), total_bytes),
                });
            }
        }

        self.flush(command, &mut buffer, token).await?;
        on_progress(ParseProgress {
            entries: lines,
            progress: 1.0,
        });

        debug!(lines = lines, skipped = skipped, "Reached end of feed");
        Ok(lines)
    }

    /// Drop leftovers of an aborted run and create the staged set empty.
    async fn reset_staging(&self, command: &ParseCommand) -> Result<(), StoreError> {
        self.store.delete(&command.entries_key).await?;
        self.store.delete(&command.timestamp_key).await?;
        self.store.create_set(&command.entries_key).await
    }

    async fn flush(
        &self,
        command: &ParseCommand,
        buffer: &mut Vec<Entry>,
        token: &CancellationToken,
    ) -> Result<(), ParseError> {
        if buffer.is_empty() {
            return Ok(());
        }

        let entries: Vec<Entry> = std::mem::take(buffer);
        let ids: Vec<EntryId> = entries.iter().map(Entry::id).collect();

        self.with_retry(token, || self.store.map_put(&self.entry_map_key, &entries))
            .await?;
        self.with_retry(token, || self.store.set_add(&command.entries_key, &ids))
            .await?;

        debug!(count = entries.len(), "Flushed entries to staged snapshot");
        Ok(())
    }

    async fn with_retry<'a, T, F>(
        &self,
        token: &CancellationToken,
        operation: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> futures::future::BoxFuture<'a, Result<T, StoreError>>,
    {
        retry_until_cancelled(
            token,
            self.config.retry_delay,
            StoreError::is_transient,
            operation,
        )
        .await
    }
}

fn fraction(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (done as f64 / total as f64).min(1.0)
}
