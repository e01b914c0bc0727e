//! Description cue types.
//!
//! A cue is two-phase: the upstream vision model produces a draft
//! (timestamp + text), and speech synthesis later resolves it with a
//! playable artifact and its measured duration. Timestamps always refer
//! to the original, unmodified source timeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a description cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CueId(pub Uuid);

impl CueId {
    /// Generate a new random cue id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CueId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A draft description cue, before synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionCue {
    /// Unique cue id
    pub id: CueId,
    /// Offset into the original source timeline, in seconds
    pub source_timestamp_secs: f64,
    /// Narration text to synthesize
    pub text: String,
}

impl DescriptionCue {
    /// Create a new draft cue.
    pub fn new(source_timestamp_secs: f64, text: impl Into<String>) -> Self {
        Self {
            id: CueId::new(),
            source_timestamp_secs,
            text: text.into(),
        }
    }
}

/// A cue resolved with its synthesized audio artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedCue {
    /// Unique cue id (same as the draft it was resolved from)
    pub id: CueId,
    /// Offset into the original source timeline, in seconds
    pub source_timestamp_secs: f64,
    /// Narration text
    pub text: String,
    /// Path to the synthesized audio artifact
    pub audio_path: PathBuf,
    /// Measured duration of the synthesized audio, in seconds
    pub audio_duration_secs: f64,
}

impl ResolvedCue {
    /// Resolve a draft cue with its synthesized artifact.
    pub fn from_draft(draft: DescriptionCue, audio_path: PathBuf, audio_duration_secs: f64) -> Self {
        Self {
            id: draft.id,
            source_timestamp_secs: draft.source_timestamp_secs,
            text: draft.text,
            audio_path,
            audio_duration_secs,
        }
    }
}

/// Check that cues are sorted by source timestamp (non-decreasing) and
/// carry sane values. Allocation depends on this ordering.
pub fn validate_cue_order(cues: &[ResolvedCue]) -> Result<(), CueValidationError> {
    let mut prev = f64::NEG_INFINITY;
    for cue in cues {
        if !cue.source_timestamp_secs.is_finite() || cue.source_timestamp_secs < 0.0 {
            return Err(CueValidationError::InvalidTimestamp {
                id: cue.id,
                value: cue.source_timestamp_secs,
            });
        }
        if !cue.audio_duration_secs.is_finite() || cue.audio_duration_secs <= 0.0 {
            return Err(CueValidationError::InvalidDuration {
                id: cue.id,
                value: cue.audio_duration_secs,
            });
        }
        if cue.source_timestamp_secs < prev {
            return Err(CueValidationError::OutOfOrder { id: cue.id });
        }
        prev = cue.source_timestamp_secs;
    }
    Ok(())
}

/// Cue validation failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CueValidationError {
    #[error("Cue {id} has invalid timestamp {value}")]
    InvalidTimestamp { id: CueId, value: f64 },

    #[error("Cue {id} has invalid audio duration {value}")]
    InvalidDuration { id: CueId, value: f64 },

    #[error("Cue {id} is out of timestamp order")]
    OutOfOrder { id: CueId },
}
