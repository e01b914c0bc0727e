//! Error types for media and placement operations.

use std::path::PathBuf;
use thiserror::Error;

use vscribe_models::CueValidationError;

/// Result type for media operations.
pub type DescribeResult<T> = Result<T, DescribeError>;

/// Errors that can occur during description placement and mixing.
#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    InvalidCues(#[from] CueValidationError),

    #[error("Timeline invariant violated: {0}")]
    TimelineInvariant(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),
}

impl DescribeError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a timeline invariant violation.
    ///
    /// This indicates an allocator or builder bug; callers must surface
    /// it, never swallow it.
    pub fn timeline_invariant(message: impl Into<String>) -> Self {
        Self::TimelineInvariant(message.into())
    }
}
