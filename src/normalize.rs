//! Stage normalization.
//!
//! Maps whatever token a backend reports onto a [`JobStatus`]. This is a
//! classification function, not an automaton: every token is classified
//! on its own, without regard to the previous stage.
//!
//! Lookup order:
//!
//! 1. empty token            → `Uploading`, unknown
//! 2. error alias            → `Complete`, final, error
//! 3. complete alias         → `Complete`, final
//! 4. uploading / splitting / transcribing aliases, in that order
//! 5. anything else          → `Uploading`, unknown
//!
//! Numbers and booleans are matched by their string form, so `true` is
//! not special and lands in the unknown bucket.

use serde_json::Value;

use crate::job::{JobStatus, Stage};

/// Backend vocabulary for each canonical stage and for failure.
///
/// Entries are lower-case; tokens are lower-cased before lookup.
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    /// Waiting or receiving media.
    pub uploading: &'static [&'static str],
    /// Stem separation.
    pub splitting: &'static [&'static str],
    /// Speech recognition.
    pub transcribing: &'static [&'static str],
    /// Finished successfully.
    pub complete: &'static [&'static str],
    /// Failed; checked before every stage.
    pub error: &'static [&'static str],
}

impl AliasTable {
    /// Aliases observed in production traffic.
    pub const STANDARD: AliasTable = AliasTable {
        uploading: &[
            "uploading",
            "pending",
            "queued",
            "initializing",
            "created",
            "starting",
        ],
        splitting: &["splitting", "separating", "processing", "isolation", "lalal"],
        transcribing: &[
            "transcribing",
            "transcribe",
            "asr",
            "speech_to_text",
            "recognition",
        ],
        complete: &["complete", "completed", "done", "finished", "success", "ready"],
        error: &["error", "failed", "failure", "cancelled", "canceled", "timeout"],
    };

    /// Aliases for one stage. `Complete` returns the success aliases only.
    pub fn aliases(&self, stage: Stage) -> &'static [&'static str] {
        match stage {
            Stage::Uploading => self.uploading,
            Stage::Splitting => self.splitting,
            Stage::Transcribing => self.transcribing,
            Stage::Complete => self.complete,
        }
    }

    /// Classify a raw status token.
    pub fn classify(&self, raw: Option<&Value>) -> JobStatus {
        let token = status_token(raw);
        let source = raw.filter(|value| !value.is_null()).cloned();

        if token.is_empty() {
            return JobStatus::unknown(source);
        }
        if contains(self.error, &token) {
            return JobStatus::failed(source);
        }
        if contains(self.complete, &token) {
            return JobStatus::complete(source);
        }

        let matched = [Stage::Uploading, Stage::Splitting, Stage::Transcribing]
            .into_iter()
            .find(|stage| contains(self.aliases(*stage), &token));

        match matched {
            Some(stage) => JobStatus::in_progress(stage, source),
            None => {
                tracing::debug!(token = %token, "unrecognized job status token");
                JobStatus::unknown(source)
            }
        }
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::STANDARD
    }
}

fn contains(aliases: &[&str], token: &str) -> bool {
    aliases.iter().any(|alias| *alias == token)
}

/// Lookup form of a raw token: trimmed and lower-cased.
///
/// Strings, numbers and booleans have a token; everything else
/// (objects, arrays, null, absence) is the empty string.
pub fn status_token(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(s)) => s.trim().to_lowercase(),
        Some(Value::Number(n)) => n.to_string().trim().to_lowercase(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Classify a raw status token against [`AliasTable::STANDARD`].
pub fn normalize_job_stage(raw: Option<&Value>) -> JobStatus {
    AliasTable::STANDARD.classify(raw)
}
