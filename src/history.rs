//! Per-job stage history with compaction.
//!
//! Repeated polls that report the same thing must not grow the history.
//! An update equal to the last entry on `(stage, is_error, raw_status)`
//! replaces that entry's timestamp; anything else is appended.
//!
//! **Invariants:**
//! - Timestamps never decrease.
//! - No two consecutive entries share `(stage, is_error, raw_status)`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job::{JobStatus, Stage};

/// One observed stage transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Stage entered.
    pub stage: Stage,
    /// Token the backend sent, if any.
    pub raw_status: Option<Value>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Backend reported a failure.
    pub is_error: bool,
}

impl HistoryEntry {
    fn same_observation(&self, stage: Stage, is_error: bool, raw_status: &Option<Value>) -> bool {
        self.stage == stage && self.is_error == is_error && &self.raw_status == raw_status
    }
}

/// A new observation to fold into a history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryUpdate {
    /// `None` makes the update a no-op.
    pub stage: Option<Stage>,
    pub raw_status: Option<Value>,
    pub is_error: Option<bool>,
    pub timestamp: i64,
}

impl HistoryUpdate {
    /// Create an update for `stage` observed at `timestamp`.
    pub fn new(stage: Stage, timestamp: i64) -> Self {
        Self {
            stage: Some(stage),
            raw_status: None,
            is_error: None,
            timestamp,
        }
    }

    /// Set the raw token.
    pub fn with_raw_status(mut self, raw_status: Value) -> Self {
        self.raw_status = Some(raw_status);
        self
    }

    /// Set the error flag.
    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = Some(is_error);
        self
    }

    /// Build an update from a classified status.
    pub fn from_status(status: &JobStatus, timestamp: i64) -> Self {
        Self {
            stage: Some(status.stage),
            raw_status: status.source.clone(),
            is_error: Some(status.is_error),
            timestamp,
        }
    }
}

/// Fold `update` into `history`, returning the new history.
///
/// The input is left untouched. A timestamp older than the last entry is
/// raised to it so the sequence stays ordered.
pub fn append_history(history: &[HistoryEntry], update: HistoryUpdate) -> Vec<HistoryEntry> {
    let mut next = history.to_vec();

    let Some(stage) = update.stage else {
        return next;
    };
    let is_error = update.is_error.unwrap_or(false);
    let raw_status = update.raw_status.filter(|value| !value.is_null());

    let floor = next.last().map_or(i64::MIN, |entry| entry.timestamp);
    let timestamp = update.timestamp.max(floor);

    match next.last_mut() {
        Some(last) if last.same_observation(stage, is_error, &raw_status) => {
            last.timestamp = timestamp;
        }
        _ => next.push(HistoryEntry {
            stage,
            raw_status,
            timestamp,
            is_error,
        }),
    }

    next
}
