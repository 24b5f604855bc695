//! # Catalog Indexer Pipeline
//!
//! This crate turns a catalog feed file into an up-to-date search index.
//!
//! ## Architecture
//!
//! One indexing run walks through four steps:
//!
//! 1. **Parser**: Streams the feed into a staged snapshot of entry identities
//! 2. **Delta**: Diffs the staged snapshot against the current one
//! 3. **Coordinator**: Fans the delta out to a pool of index workers
//! 4. **Orchestrator**: Sequences the steps and commits the staged snapshot
//!
//! Parser and workers run as separate tasks and talk to their owner over
//! a small command/event protocol (see [`protocol`]).

pub mod cancellation;
pub mod coordinator;
pub mod delta;
pub mod errors;
pub mod orchestrator;
pub mod parser;
pub mod protocol;
pub mod retry;
pub mod throttle;

#[cfg(test)]
mod testing;

pub use cancellation::CancellationToken;
pub use coordinator::{CoordinatorConfig, WorkerCoordinator};
pub use delta::{Delta, DeltaComputer};
pub use errors::{ParseError, PipelineError, WorkerError};
pub use orchestrator::{IndexingOrchestrator, OrchestratorConfig, RunRequest, RunSummary};
pub use parser::{FeedParser, ParseCommand, ParserConfig};
