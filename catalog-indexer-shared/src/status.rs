//! Orchestration status published to observers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Steps of the indexing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    /// Idle, waiting for a run request.
    #[default]
    Waiting,
    /// Parsing the feed into the staged snapshot.
    ParseFeed,
    /// Diffing the staged snapshot against the current one.
    CreateDelta,
    /// Applying the delta to the search engine.
    IndexDelta,
    /// Committing the staged snapshot.
    Finalize,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Waiting => "waiting",
            Step::ParseFeed => "parseFeed",
            Step::CreateDelta => "createDelta",
            Step::IndexDelta => "indexDelta",
            Step::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Progress payload of the feed parser.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParseProgress {
    /// Entry lines processed so far.
    pub entries: u64,
    /// Fraction of the feed file consumed, in `0.0..=1.0`.
    pub progress: f64,
}

/// The externally observable state of the orchestrator.
///
/// Entering a step replaces the status; progress reports within a step merge
/// into it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerStatus {
    /// Current step.
    pub step: Step,
    /// Lines parsed so far (parse step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<u64>,
    /// Size of the added set, or entries indexed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_entries: Option<u64>,
    /// Size of the removed set, or entries removed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_entries: Option<u64>,
    /// Fractional progress of the current step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl IndexerStatus {
    /// A fresh status for the given step.
    pub fn at(step: Step) -> Self {
        Self {
            step,
            ..Default::default()
        }
    }
}
