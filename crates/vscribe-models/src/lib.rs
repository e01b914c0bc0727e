//! Shared data models for the vscribe description engine.
//!
//! This crate provides Serde-serializable types for:
//! - Description cues (draft and resolved forms)
//! - Timestamp parsing and validation

pub mod cue;
pub mod timestamp;

// Re-export common types
pub use cue::{validate_cue_order, CueId, CueValidationError, DescriptionCue, ResolvedCue};
pub use timestamp::{
    clamp_to_duration, format_seconds, normalize_timestamp, parse_timestamp, TimestampError,
};
