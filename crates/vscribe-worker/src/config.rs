//! Pipeline configuration.

use std::time::Duration;

/// Hard cap on synthesis concurrency regardless of configuration.
const MAX_SYNTHESIS_CONCURRENCY: usize = 10;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum concurrent synthesis requests
    pub synthesis_concurrency: usize,
    /// Attempts per cue before synthesis is considered failed
    pub synthesis_attempts: u32,
    /// Delay between synthesis attempts
    pub synthesis_retry_delay: Duration,
    /// How often to poll for a synthesized artifact
    pub artifact_poll_interval: Duration,
    /// How long to wait for a synthesized artifact before giving up
    pub artifact_poll_timeout: Duration,
    /// Maximum concurrent FFmpeg processes during segment rendering
    pub max_ffmpeg_processes: usize,
    /// Whole-run deadline
    pub run_timeout: Duration,
    /// Directory for scratch files; a temp dir is created inside it
    pub work_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            synthesis_concurrency: 3,
            synthesis_attempts: 3,
            synthesis_retry_delay: Duration::from_secs(2),
            artifact_poll_interval: Duration::from_millis(500),
            artifact_poll_timeout: Duration::from_secs(30),
            max_ffmpeg_processes: 4,
            run_timeout: Duration::from_secs(600), // 10 minutes
            work_dir: "/tmp/vscribe".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            synthesis_concurrency: std::env::var("VSCRIBE_SYNTH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3)
                .clamp(1, MAX_SYNTHESIS_CONCURRENCY),
            synthesis_attempts: std::env::var("VSCRIBE_SYNTH_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            synthesis_retry_delay: Duration::from_secs(
                std::env::var("VSCRIBE_SYNTH_RETRY_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            artifact_poll_interval: Duration::from_millis(
                std::env::var("VSCRIBE_ARTIFACT_POLL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            artifact_poll_timeout: Duration::from_secs(
                std::env::var("VSCRIBE_ARTIFACT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_ffmpeg_processes: std::env::var("VSCRIBE_MAX_FFMPEG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4)
                .max(1),
            run_timeout: Duration::from_secs(
                std::env::var("VSCRIBE_RUN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            work_dir: std::env::var("VSCRIBE_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/vscribe".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.synthesis_concurrency, 3);
        assert_eq!(config.synthesis_attempts, 3);
        assert_eq!(config.run_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_concurrency_is_capped() {
        // from_env clamps; the cap also bounds hand-built configs going
        // through it
        assert!(PipelineConfig::default().synthesis_concurrency <= MAX_SYNTHESIS_CONCURRENCY);
    }
}
