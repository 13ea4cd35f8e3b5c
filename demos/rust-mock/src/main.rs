//! Minimal mock status backend driven by a `JobTracker`.
//!
//! The backend answers each poll with the next response of a per-job
//! script. The scripts use the inconsistent shapes real media services
//! return, which the tracker normalizes into canonical stages.
//!
//! Run with `RUST_LOG=stagetrack=debug` to watch the polling decisions.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Value, json};
use stagetrack::{
    JobId, JobTracker, PollConfig, StatusSource, TrackError, TrackResult, parse_create_response,
};
use tracing_subscriber::EnvFilter;

/// In-memory backend replaying scripted status responses.
struct MockBackend {
    scripts: Mutex<HashMap<String, VecDeque<Value>>>,
    next_id: Mutex<u64>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
        }
    }

    /// Accept an upload and return a create-job response.
    fn create(&self, file_name: &str, script: Vec<Value>) -> Value {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            format!("mock-{}", *next)
        };
        self.scripts.lock().insert(id.clone(), script.into());
        json!({
            "success": true,
            "message": "Upload accepted",
            "data": {"task": {"task_id": id, "fileName": file_name, "state": "created"}},
        })
    }
}

#[async_trait]
impl StatusSource for MockBackend {
    fn name(&self) -> &str {
        "mock-media"
    }

    async fn fetch_status(&self, job_id: &JobId) -> TrackResult<Value> {
        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(job_id.as_str())
            .ok_or_else(|| TrackError::JobNotFound(job_id.to_string()))?;
        let response = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        response.ok_or_else(|| TrackError::SourceUnavailable("no response scripted".into()))
    }

    async fn fetch_jobs(&self) -> TrackResult<Value> {
        let scripts = self.scripts.lock();
        let items: Vec<Value> = scripts
            .iter()
            .filter_map(|(id, script)| {
                let mut item = script.front()?.clone();
                item.as_object_mut()?.insert("id".into(), json!(id));
                Some(item)
            })
            .collect();
        Ok(json!({"items": items}))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let backend = MockBackend::new();
    let stems = backend.create(
        "rehearsal.wav",
        vec![
            json!({"status": "queued"}),
            json!({"progress": {"stage": "separating", "percent": 40}}),
            json!({"progress": {"stage": "separating", "percent": 90}}),
            json!({"job": {"currentStep": "ASR"}}),
            json!({"status": "done", "detail": "Stems and transcript ready"}),
        ],
    );
    let broken = backend.create(
        "voice-memo.m4a",
        vec![
            json!({"state": "pending"}),
            json!({"data": {"status": "FAILED", "error_message": "Unsupported codec"}}),
        ],
    );

    let preview = parse_create_response(&stems);
    println!("Create response decodes to: {preview:?}");
    println!();

    let config = PollConfig::every(Duration::from_millis(200)).with_max_polls(20);
    let tracker = JobTracker::new(backend, config)?;

    let mut ids = tracker.track_created(&stems, Utc::now())?;
    ids.extend(tracker.track_created(&broken, Utc::now())?);

    for id in &ids {
        let status = tracker.poll_until_final(id).await?;
        println!("Job {id}: {status}");
    }
    println!();

    let synced = tracker.refresh_list().await?;
    println!("List sync touched {} job(s)", synced.len());
    println!();

    for record in tracker.records() {
        println!(
            "{} ({}): {}",
            record.id,
            record.source_ref,
            record.message.as_deref().unwrap_or("-")
        );
        for entry in &record.history {
            let raw = entry
                .raw_status
                .as_ref()
                .map_or_else(|| "-".to_string(), Value::to_string);
            let marker = if entry.is_error { " !" } else { "" };
            println!("  {:>13}  {:<12} {raw}{marker}", entry.timestamp, entry.stage.label());
        }
    }

    Ok(())
}
