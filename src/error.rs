//! Tracking error types.
//!
//! The pure extraction and normalization functions never fail: an absent
//! field is `None` and an unrecognized token is classified as unknown.
//! Errors exist only at the polling boundary.
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Transient** | `SourceUnavailable`, `Timeout`, `Transport` | Retry on next tick or manual refresh |
//! | **Tracking** | `JobNotFound`, `AlreadyTracked`, `MissingJobId` | Fix the caller's bookkeeping |
//! | **Capability** | `Unsupported` | Use another source |
//! | **Config** | `Configuration`, `Decode` | Fix configuration or payload |

use thiserror::Error;

/// Errors that can occur while tracking jobs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackError {
    // ── Transient errors (retry) ─────────────────────────────────────
    /// Status endpoint is not reachable.
    #[error("Status source not available: {0}")]
    SourceUnavailable(String),

    /// Polling gave up before the job reached a final stage.
    #[error("Timeout waiting for job {0}")]
    Timeout(String),

    /// The request was sent but the transport failed.
    #[error("Transport error: {0}")]
    Transport(String),

    // ── Tracking errors ──────────────────────────────────────────────
    /// Job is not tracked.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Job is already tracked.
    #[error("Job already tracked: {0}")]
    AlreadyTracked(String),

    /// A task object carried no usable identifier.
    #[error("Task has no job id")]
    MissingJobId,

    // ── Capability / config errors ───────────────────────────────────
    /// Operation not supported by this status source.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Response body or configuration could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TrackError {
    /// Returns `true` if the failure is worth retrying on the next poll.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_) | Self::Timeout(_) | Self::Transport(_)
        )
    }
}

/// Result type for tracking operations.
pub type TrackResult<T> = Result<T, TrackError>;
