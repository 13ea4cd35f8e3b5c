//! Caller-side job state.
//!
//! The engine functions never hold a [`JobRecord`]; they take payloads and
//! return values. A record is what a UI keeps per job, and its methods are
//! the glue between a poll response and that state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TrackError, TrackResult};
use crate::history::{HistoryEntry, HistoryUpdate, append_history};
use crate::job::{JobId, JobStatus};
use crate::snapshot::{TaskSnapshot, parse_status_response};

/// Everything known about one tracked job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Source URL or filename; empty when the backend never sent one.
    pub source_ref: String,
    /// Latest human-readable message from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: JobStatus,
    pub history: Vec<HistoryEntry>,
    pub last_updated_at: DateTime<Utc>,
    pub is_polling: bool,
    /// Transport failure of the last poll, cleared by the next success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_error: Option<String>,
    pub is_manual_refresh: bool,
}

impl JobRecord {
    /// A fresh record with no observations.
    pub fn new(id: impl Into<JobId>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            source_ref: String::new(),
            message: None,
            status: JobStatus::default(),
            history: Vec::new(),
            last_updated_at: now,
            is_polling: false,
            polling_error: None,
            is_manual_refresh: false,
        }
    }

    /// Seed a record from a task decoded out of a create or list response.
    pub fn from_snapshot(snapshot: TaskSnapshot, now: DateTime<Utc>) -> TrackResult<Self> {
        let id = snapshot.id.clone().ok_or(TrackError::MissingJobId)?;
        let mut record = Self::new(id, now);
        record.apply_snapshot(snapshot, now);
        Ok(record)
    }

    /// Fold a decoded snapshot into the record.
    ///
    /// Status and history always update. Message and source reference only
    /// update when the snapshot carries them, so a sparse poll response
    /// does not blank out what an earlier one said.
    pub fn apply_snapshot(&mut self, snapshot: TaskSnapshot, now: DateTime<Utc>) {
        self.history = append_history(
            &self.history,
            HistoryUpdate::from_status(&snapshot.status, now.timestamp_millis()),
        );
        self.status = snapshot.status;
        if let Some(message) = snapshot.message {
            self.message = Some(message);
        }
        if let Some(source_ref) = snapshot.source_ref {
            self.source_ref = source_ref;
        }
        self.polling_error = None;
        self.last_updated_at = now;
    }

    /// Fold a raw job-status response into the record.
    pub fn apply_status_payload(&mut self, payload: &Value, now: DateTime<Utc>) {
        self.apply_snapshot(parse_status_response(payload), now);
    }

    /// Record a transport failure. Status and history are left alone.
    pub fn record_poll_failure(&mut self, error: &TrackError) {
        self.polling_error = Some(error.to_string());
    }

    /// Check if polling should continue.
    pub fn needs_polling(&self) -> bool {
        !self.status.is_final
    }
}
