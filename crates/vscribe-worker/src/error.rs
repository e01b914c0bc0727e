//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Synthesized audio never materialized: {0}")]
    MissingArtifact(PathBuf),

    #[error("Music generation failed: {0}")]
    MusicFailed(String),

    #[error("Script parse error: {0}")]
    ScriptParse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] vscribe_media::DescribeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn synthesis_failed(msg: impl Into<String>) -> Self {
        Self::SynthesisFailed(msg.into())
    }

    pub fn music_failed(msg: impl Into<String>) -> Self {
        Self::MusicFailed(msg.into())
    }

    pub fn script_parse(msg: impl Into<String>) -> Self {
        Self::ScriptParse(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the run was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Media(vscribe_media::DescribeError::Cancelled))
    }

    /// Whether the run hit its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::Media(vscribe_media::DescribeError::Timeout(_)))
    }
}
