//! Job identity and canonical status types.
//!
//! The stage set is closed:
//!
//! ```text
//!   Uploading ──→ Splitting ──→ Transcribing ──→ Complete
//!                                                   │
//!                                    (is_error) ────┘
//! ```
//!
//! **Invariants:**
//! - `is_error ⇒ is_final ⇒ stage == Complete`.
//! - Errors have no stage of their own; they are a final `Complete`.
//! - `is_unknown` never changes `stage`; unclassified tokens stay `Uploading`.
//! - Progress is not enforced: each poll is classified independently, so a
//!   backend that reports a stage going backwards is taken at its word.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for a tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical processing stage of a media job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Media is being received or the job is waiting to start.
    Uploading,
    /// Stems are being separated.
    Splitting,
    /// Speech is being transcribed.
    Transcribing,
    /// Job finished, successfully or not.
    Complete,
}

impl Stage {
    /// Canonical lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Uploading => "uploading",
            Stage::Splitting => "splitting",
            Stage::Transcribing => "transcribing",
            Stage::Complete => "complete",
        }
    }

    /// Human-readable label for progress displays.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Uploading => "Uploading",
            Stage::Splitting => "Splitting",
            Stage::Transcribing => "Transcribing",
            Stage::Complete => "Complete",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified status of a job, as derived from one poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Canonical stage.
    pub stage: Stage,
    /// No further polling should occur.
    pub is_final: bool,
    /// Backend reported a failure. Implies `is_final`.
    pub is_error: bool,
    /// The raw token matched no alias (or was absent).
    pub is_unknown: bool,
    /// Raw status token as the backend sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

impl JobStatus {
    /// Fallback for absent or unrecognized tokens.
    pub fn unknown(source: Option<Value>) -> Self {
        Self {
            stage: Stage::Uploading,
            is_final: false,
            is_error: false,
            is_unknown: true,
            source,
        }
    }

    /// A recognized non-terminal stage.
    pub fn in_progress(stage: Stage, source: Option<Value>) -> Self {
        Self {
            stage,
            is_final: false,
            is_error: false,
            is_unknown: false,
            source,
        }
    }

    /// Successful completion.
    pub fn complete(source: Option<Value>) -> Self {
        Self {
            stage: Stage::Complete,
            is_final: true,
            is_error: false,
            is_unknown: false,
            source,
        }
    }

    /// Backend-reported failure.
    pub fn failed(source: Option<Value>) -> Self {
        Self {
            stage: Stage::Complete,
            is_final: true,
            is_error: true,
            is_unknown: false,
            source,
        }
    }

    /// Check if polling should continue.
    pub fn is_pending(&self) -> bool {
        !self.is_final
    }

    /// Check if the job completed successfully.
    pub fn is_success(&self) -> bool {
        self.is_final && !self.is_error
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::unknown(None)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_error {
            write!(f, "{} (failed)", self.stage)
        } else if self.is_unknown {
            write!(f, "{} (unknown)", self.stage)
        } else {
            write!(f, "{}", self.stage)
        }
    }
}
