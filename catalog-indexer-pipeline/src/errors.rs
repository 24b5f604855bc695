//! Error types for the indexing pipeline.

use thiserror::Error;

use catalog_indexer_repository::{SearchError, StoreError};

/// Errors raised while parsing a feed into a staged snapshot.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The feed file could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The metadata line is missing or carries no usable timestamp.
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    /// An entry line is not an array of row fields.
    #[error("Malformed row {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// Writing the snapshot to the identity store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The run was cancelled while parsing.
    #[error("Parse cancelled")]
    Cancelled,
}

impl ParseError {
    /// Create a malformed metadata error.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::MalformedMetadata(msg.into())
    }

    /// Create a malformed row error.
    pub fn row(line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            line,
            reason: reason.into(),
        }
    }
}

/// Errors raised by a single indexing worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Claiming or resolving a batch failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The search engine rejected a batch.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// The run was cancelled before the assignment was exhausted.
    #[error("Worker cancelled")]
    Cancelled,
}

/// Errors that abort an indexing run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The feed could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The identity store failed outside of the import path.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The search engine failed outside of a worker.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// A worker reported a failure; the whole indexing step is aborted.
    #[error("Worker {worker} failed: {source}")]
    Worker {
        worker: usize,
        #[source]
        source: WorkerError,
    },

    /// A unit channel closed without a `done` or `error` message.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl PipelineError {
    /// Create a worker error.
    pub fn worker(worker: usize, source: WorkerError) -> Self {
        Self::Worker { worker, source }
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }
}
