//! Decoding of whole responses into per-task snapshots.
//!
//! A snapshot is everything the engine can say about one task from one
//! payload: its id, message, source reference and classified status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collect::Object;
use crate::extract::Candidates;
use crate::fields::{job_id_in, message_in, source_ref_in};
use crate::job::{JobId, JobStatus};
use crate::locate::{locate_in, locate_tasks};
use crate::normalize::normalize_job_stage;
use crate::status::resolve_in;

/// Fields extracted from one task object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: Option<JobId>,
    pub message: Option<String>,
    pub source_ref: Option<String>,
    pub status: JobStatus,
}

impl TaskSnapshot {
    fn from_candidates(candidates: &Candidates<'_>) -> Self {
        Self {
            id: job_id_in(candidates).map(JobId::from),
            message: message_in(candidates),
            source_ref: source_ref_in(candidates),
            status: normalize_job_stage(resolve_in(candidates)),
        }
    }

    /// Snapshot of a single task object and everything nested under it.
    pub fn from_task(task: &Object) -> Self {
        Self::from_candidates(&Candidates::from_object(task))
    }

    /// Fill absent metadata from `other`. Status is never borrowed.
    fn or(mut self, other: Self) -> Self {
        self.id = self.id.or(other.id);
        self.message = self.message.or(other.message);
        self.source_ref = self.source_ref.or(other.source_ref);
        self
    }
}

/// Snapshots of every task in a create-job response.
///
/// When the response holds exactly one task, the id, message and source
/// reference missing from the task itself are looked up across the whole
/// payload. The status always comes from the task: an envelope's
/// `"status": "success"` describes the request, not the job.
pub fn parse_create_response(payload: &Value) -> Vec<TaskSnapshot> {
    let candidates = Candidates::new(payload);
    let tasks = locate_in(&candidates);

    if let [task] = tasks[..] {
        let envelope = TaskSnapshot::from_candidates(&candidates);
        return vec![TaskSnapshot::from_task(task).or(envelope)];
    }
    tasks.into_iter().map(TaskSnapshot::from_task).collect()
}

/// Snapshots of every task in a list-jobs response.
///
/// Each snapshot comes from its own task object only, however many tasks
/// the response holds.
pub fn parse_list_response(payload: &Value) -> Vec<TaskSnapshot> {
    locate_tasks(payload)
        .into_iter()
        .map(TaskSnapshot::from_task)
        .collect()
}

/// Snapshot of a job-status response, searched as a whole.
pub fn parse_status_response(payload: &Value) -> TaskSnapshot {
    TaskSnapshot::from_candidates(&Candidates::new(payload))
}
