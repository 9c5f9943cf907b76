//! Run progress reporting and cooperative cancellation.
//!
//! Every pipeline run emits [`SearchProgress`] events through a
//! [`ProgressReporter`]. The event shape is stable regardless of the
//! consumer — a CLI renders it to stderr, an embedding application can
//! collect it with [`BufferedReporter`]. Cancellation is cooperative:
//! the pipeline checks a [`CancelToken`] at every suspension point and,
//! once it is set, emits nothing further and returns no results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// One ordered step of a pipeline run.
///
/// DeepSearch visits the first eight variants strictly in order;
/// QuickMatch visits a subsequence. `Completed` terminates every
/// non-cancelled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "parsing")]
    Parsing,
    #[serde(rename = "loading")]
    Loading,
    #[serde(rename = "initialFilter")]
    InitialFilter,
    #[serde(rename = "conditionMatch")]
    ConditionMatch,
    #[serde(rename = "deepAnalysis")]
    DeepAnalysis,
    #[serde(rename = "scoring")]
    Scoring,
    #[serde(rename = "caseComparison")]
    CaseComparison,
    #[serde(rename = "sorting")]
    Sorting,
    #[serde(rename = "completed")]
    Completed,
}

impl Stage {
    /// The eight DeepSearch stages in execution order, without the
    /// terminal `Completed`.
    pub const DEEP_ORDER: [Stage; 8] = [
        Stage::Parsing,
        Stage::Loading,
        Stage::InitialFilter,
        Stage::ConditionMatch,
        Stage::DeepAnalysis,
        Stage::Scoring,
        Stage::CaseComparison,
        Stage::Sorting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parsing => "parsing",
            Stage::Loading => "loading",
            Stage::InitialFilter => "initialFilter",
            Stage::ConditionMatch => "conditionMatch",
            Stage::DeepAnalysis => "deepAnalysis",
            Stage::Scoring => "scoring",
            Stage::CaseComparison => "caseComparison",
            Stage::Sorting => "sorting",
            Stage::Completed => "completed",
        }
    }
}

/// A single progress event.
///
/// `percent` is monotonically non-decreasing across a run (0–100), as
/// are all counts. Count fields are `None` until the stage that owns
/// them first reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    pub stage: Stage,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed: Option<u64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Reports run progress. Implementations decide the medium (stderr,
/// buffer, channel); the pipeline only calls [`report`](Self::report).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: SearchProgress);
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: SearchProgress) {}
}

/// Collects every event in memory. Useful for tests and for embedding
/// consumers that render progress after the fact.
#[derive(Default)]
pub struct BufferedReporter {
    events: Mutex<Vec<SearchProgress>>,
}

impl BufferedReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SearchProgress> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for BufferedReporter {
    fn report(&self, event: SearchProgress) {
        self.events.lock().unwrap().push(event);
    }
}

/// Cooperative cancellation flag shared between a run and its caller.
///
/// Cloning shares the flag. Once set it stays set; the owning run
/// observes it at the next suspension point, stops emitting progress,
/// and discards partial results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
