//! Task field extractors: job id, human message, source reference.
//!
//! Each is the keyed extractor seeded with the aliases backends have been
//! seen to use. All of them return `None` when the field is absent.

use serde_json::Value;

use crate::extract::{Candidates, is_non_blank_str};

/// Identifier keys, most preferred first.
pub const JOB_ID_KEYS: &[&str] = &[
    "uuid", "jobUuid", "jobUUID", "jobId", "id", "job_id", "job_uuid", "taskId", "task_id",
    "trackId", "track_id",
];

/// Human-readable message keys, most preferred first.
pub const MESSAGE_KEYS: &[&str] = &[
    "message",
    "detail",
    "statusMessage",
    "status_message",
    "error",
    "errorMessage",
    "error_message",
    "description",
    "statusDescription",
    "status_description",
];

/// Source URL keys, tried before [`FILENAME_KEYS`].
pub const SOURCE_URL_KEYS: &[&str] = &[
    "sourceUrl",
    "source_url",
    "url",
    "inputUrl",
    "input_url",
    "mediaUrl",
    "media_url",
    "originalUrl",
    "original_url",
];

/// Filename keys, the fallback for a missing source URL.
pub const FILENAME_KEYS: &[&str] = &[
    "fileName",
    "filename",
    "originalFileName",
    "original_filename",
    "name",
];

fn is_usable_id(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn trimmed(value: &Value) -> String {
    value.as_str().map(str::trim).unwrap_or_default().to_string()
}

/// Job identifier of `payload`, stringified.
///
/// Numbers keep their JSON form (`17` becomes `"17"`).
pub fn extract_job_id(payload: &Value) -> Option<String> {
    job_id_in(&Candidates::new(payload))
}

/// Trimmed human-readable message of `payload`.
pub fn extract_message(payload: &Value) -> Option<String> {
    message_in(&Candidates::new(payload))
}

/// Source URL of `payload`, or failing that its filename.
pub fn extract_source_ref(payload: &Value) -> Option<String> {
    source_ref_in(&Candidates::new(payload))
}

pub(crate) fn job_id_in(candidates: &Candidates<'_>) -> Option<String> {
    candidates.find_map(JOB_ID_KEYS, is_usable_id, stringify)
}

pub(crate) fn message_in(candidates: &Candidates<'_>) -> Option<String> {
    candidates.find_map(MESSAGE_KEYS, is_non_blank_str, trimmed)
}

pub(crate) fn source_ref_in(candidates: &Candidates<'_>) -> Option<String> {
    candidates
        .find_map(SOURCE_URL_KEYS, is_non_blank_str, trimmed)
        .or_else(|| candidates.find_map(FILENAME_KEYS, is_non_blank_str, trimmed))
}
