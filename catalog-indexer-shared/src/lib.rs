//! # Catalog Indexer Shared
//!
//! Data model shared by the parser, the indexing pipeline and the search
//! repository: catalog entries and their identities, snapshot key layout,
//! indexing jobs, progress/status payloads and the abstract query model.

pub mod entry;
pub mod job;
pub mod query;
pub mod search;
pub mod snapshot;
pub mod status;

pub use entry::{Entry, EntryId};
pub use job::{IndexJob, JobOperation, WorkerState};
pub use query::{AbstractQuery, BoolQuery, RangeQuery, SearchQuery, Sort, SortOrder, TermValue};
pub use search::{ApiResult, ErrorType, ResultError, SearchHit, SearchResponse};
pub use snapshot::SnapshotKeys;
pub use status::{IndexerStatus, ParseProgress, Step};
