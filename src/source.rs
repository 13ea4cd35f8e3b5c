//! Status source trait and polling configuration.
//!
//! A [`StatusSource`] is the HTTP side of tracking: it fetches raw JSON and
//! nothing else. Decoding, classification and history live in this crate;
//! transport, auth and retries of individual requests live in the source.
//!
//! ```text
//!   fetch_status(id) ──→ resolve/normalize ──→ append_history ──→ JobRecord
//!     (async, I/O)          (sync, pure)         (sync, pure)      (caller)
//! ```
//!
//! ## Method table
//!
//! | Method | Kind | Required | Returns |
//! |--------|------|----------|---------|
//! | `name()` | sync | yes | `&str` |
//! | `fetch_status()` | async | yes | `TrackResult<Value>` |
//! | `fetch_jobs()` | async | provided | `TrackResult<Value>` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TrackError, TrackResult};
use crate::job::JobId;

/// Backend that reports job progress.
///
/// # Contract
///
/// - `fetch_status()` issues one request against the job-status endpoint
///   for `job_id` and returns the decoded body as-is. It MUST NOT retry;
///   the tracker decides when to poll again.
/// - Any error is treated as a transport failure: it is recorded on the
///   job and never changes the job's status.
/// - `fetch_jobs()` returns a list-jobs response; sources without one keep
///   the default, which reports `Unsupported`.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Get the name of this source.
    fn name(&self) -> &str;

    /// Fetch the raw status response for one job.
    async fn fetch_status(&self, job_id: &JobId) -> TrackResult<Value>;

    /// Fetch the raw list-jobs response.
    async fn fetch_jobs(&self) -> TrackResult<Value> {
        Err(TrackError::Unsupported(format!(
            "{} cannot list jobs",
            self.name()
        )))
    }
}

/// Polling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between polls of one job, in milliseconds.
    pub interval_ms: u64,
    /// Give up after this many polls. `None` polls until final.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            max_polls: None,
        }
    }
}

impl PollConfig {
    /// Create a config polling every `interval`, without a limit.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            max_polls: None,
        }
    }

    /// Set the poll limit.
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Delay between polls as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> TrackResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would spin or never poll.
    pub fn validate(&self) -> TrackResult<()> {
        if self.interval_ms == 0 {
            return Err(TrackError::Configuration(
                "interval_ms must be positive".into(),
            ));
        }
        if self.max_polls == Some(0) {
            return Err(TrackError::Configuration(
                "max_polls must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
