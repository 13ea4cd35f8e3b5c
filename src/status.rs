//! Status resolution: find the raw status token anywhere in a payload.

use serde_json::Value;

use crate::extract::{Candidates, extract, is_present};
use crate::job::JobStatus;
use crate::normalize::normalize_job_stage;

/// Status-bearing keys, most preferred first.
pub const STATUS_KEYS: &[&str] = &[
    "status",
    "stage",
    "state",
    "phase",
    "step",
    "currentStep",
    "current_stage",
    "jobStatus",
    "statusText",
];

/// Raw status token of `payload`, untransformed.
///
/// Any non-null value is accepted, including numbers and booleans.
pub fn resolve_status(payload: &Value) -> Option<&Value> {
    extract(payload, STATUS_KEYS)
}

/// Resolve and classify in one step.
pub fn job_status_of(payload: &Value) -> JobStatus {
    normalize_job_stage(resolve_status(payload))
}

pub(crate) fn resolve_in<'a>(candidates: &Candidates<'a>) -> Option<&'a Value> {
    candidates.find(STATUS_KEYS, is_present)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Stage;
    use serde_json::json;

    #[test]
    fn test_nested_status() {
        let payload = json!({"data": {"status": "processing"}});
        assert_eq!(resolve_status(&payload), Some(&json!("processing")));
    }

    #[test]
    fn test_deep_progress_stage() {
        let payload = json!({"ok": true, "progress": {"stage": "asr", "percent": 40}});
        assert_eq!(job_status_of(&payload).stage, Stage::Transcribing);
    }

    #[test]
    fn test_earlier_candidate_wins_over_better_key() {
        let payload = json!({"phase": "queued", "task": {"status": "done"}});
        assert_eq!(resolve_status(&payload), Some(&json!("queued")));
    }

    #[test]
    fn test_numeric_token_passes_through() {
        let payload = json!({"job": {"jobStatus": 2}});
        assert_eq!(resolve_status(&payload), Some(&json!(2)));
        assert!(job_status_of(&payload).is_unknown);
    }

    #[test]
    fn test_missing_status_is_unknown() {
        let payload = json!({"id": "t-1"});
        assert_eq!(resolve_status(&payload), None);
        let status = job_status_of(&payload);
        assert_eq!(status.stage, Stage::Uploading);
        assert!(status.is_unknown);
    }
}
