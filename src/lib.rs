//! stagetrack — schema-tolerant job-status ingestion and stage tracking
//!
//! Media backends report the progress of long-running jobs (uploads, stem
//! splitting, transcription) in whatever shape they like: the status may
//! sit at the root, under `data.task`, or inside `progress.stage`, and the
//! vocabulary differs from one service to the next. This crate turns such
//! responses into a small canonical model.
//!
//! # Overview
//!
//! - [`collect`] flattens a payload into the objects it contains
//! - [`extract`] / [`Candidates`] search those objects by prioritized keys
//! - [`resolve_status`] finds the raw status token
//! - [`normalize_job_stage`] maps it onto a [`Stage`] and [`JobStatus`]
//! - [`append_history`] keeps a compacted [`HistoryEntry`] log
//! - [`extract_job_id`], [`extract_message`], [`extract_source_ref`] pull
//!   task metadata, and [`locate_tasks`] finds task objects in create and
//!   list responses
//! - [`JobTracker`] polls a [`StatusSource`] and keeps one [`JobRecord`] per job
//!
//! # Data flow
//!
//! ```text
//!   payload ──→ collect ──→ resolve_status ──→ normalize_job_stage ──→ append_history
//!                  │                                                          │
//!                  └──→ extract_job_id / extract_message / extract_source_ref ┴──→ JobRecord
//! ```
//!
//! Everything up to [`JobRecord`] is synchronous and pure: absent fields are
//! `None` and unrecognized tokens are classified as unknown, never errors.
//! Only [`JobTracker`] performs I/O, through the [`StatusSource`] trait.
//!
//! ```
//! use serde_json::json;
//! use stagetrack::{Stage, job_status_of, extract_job_id};
//!
//! let payload = json!({"ok": true, "data": {"task": {"id": "task-321", "state": "Processing"}}});
//! assert_eq!(extract_job_id(&payload).as_deref(), Some("task-321"));
//! assert_eq!(job_status_of(&payload).stage, Stage::Splitting);
//! ```

pub mod collect;
pub mod error;
pub mod extract;
pub mod fields;
pub mod history;
pub mod job;
pub mod locate;
pub mod normalize;
pub mod record;
pub mod snapshot;
pub mod source;
pub mod status;
pub mod tracker;

pub use collect::{Object, collect};
pub use error::{TrackError, TrackResult};
pub use extract::{Candidates, extract, extract_with};
pub use fields::{extract_job_id, extract_message, extract_source_ref};
pub use history::{HistoryEntry, HistoryUpdate, append_history};
pub use job::{JobId, JobStatus, Stage};
pub use locate::locate_tasks;
pub use normalize::{AliasTable, normalize_job_stage};
pub use record::JobRecord;
pub use snapshot::{
    TaskSnapshot, parse_create_response, parse_list_response, parse_status_response,
};
pub use source::{PollConfig, StatusSource};
pub use status::{job_status_of, resolve_status};
pub use tracker::{JobTracker, RefreshOutcome};
