//! Narration synthesis fan-out.
//!
//! The actual voice lives behind [`SpeechSynthesizer`]; this module
//! owns the concurrency, retry and artifact-materialization policy
//! around it and turns draft cues into [`ResolvedCue`]s with measured
//! durations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use vscribe_media::get_duration;
use vscribe_models::{DescriptionCue, ResolvedCue};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Produces a narration audio clip for one cue.
///
/// Implementations may write the file directly or hand the request to a
/// remote service that materializes it later; callers poll for the
/// artifact either way.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, cue: &DescriptionCue, output: &Path) -> WorkerResult<()>;
}

/// Synthesize all cues concurrently and resolve their durations.
///
/// Concurrency is bounded by `config.synthesis_concurrency`; each cue
/// gets up to `config.synthesis_attempts` tries with a fixed delay in
/// between. Output order matches input order. Any cue exhausting its
/// attempts fails the whole batch.
pub async fn resolve_cues(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cues: Vec<DescriptionCue>,
    work_dir: &Path,
    config: &PipelineConfig,
) -> WorkerResult<Vec<ResolvedCue>> {
    let semaphore = Arc::new(Semaphore::new(config.synthesis_concurrency));
    let mut handles = Vec::with_capacity(cues.len());

    for (i, cue) in cues.into_iter().enumerate() {
        let synthesizer = Arc::clone(&synthesizer);
        let semaphore = Arc::clone(&semaphore);
        let output = work_dir.join(format!("cue_{:04}.wav", i));
        let config = config.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| WorkerError::synthesis_failed("Synthesis pool closed"))?;
            resolve_one(synthesizer.as_ref(), cue, output, &config).await
        }));
    }

    let mut resolved = Vec::with_capacity(handles.len());
    for handle in handles {
        let cue = handle
            .await
            .map_err(|e| WorkerError::synthesis_failed(format!("Synthesis task panicked: {}", e)))??;
        resolved.push(cue);
    }
    Ok(resolved)
}

async fn resolve_one(
    synthesizer: &dyn SpeechSynthesizer,
    cue: DescriptionCue,
    output: PathBuf,
    config: &PipelineConfig,
) -> WorkerResult<ResolvedCue> {
    let mut last_error = None;
    for attempt in 1..=config.synthesis_attempts {
        match synthesizer.synthesize(&cue, &output).await {
            Ok(()) => {
                wait_for_artifact(&output, config).await?;
                let duration = get_duration(&output).await?;
                debug!(
                    cue_id = %cue.id,
                    attempt,
                    duration_secs = duration,
                    "Narration synthesized"
                );
                return Ok(ResolvedCue::from_draft(cue, output, duration));
            }
            Err(e) => {
                warn!(
                    cue_id = %cue.id,
                    attempt,
                    max_attempts = config.synthesis_attempts,
                    error = %e,
                    "Synthesis attempt failed"
                );
                last_error = Some(e);
                if attempt < config.synthesis_attempts {
                    metrics::record_synthesis_retry();
                    tokio::time::sleep(config.synthesis_retry_delay).await;
                }
            }
        }
    }

    Err(WorkerError::synthesis_failed(format!(
        "Cue {} failed after {} attempts: {}",
        cue.id,
        config.synthesis_attempts,
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    )))
}

/// Wait for a synthesized artifact to appear and settle on disk.
///
/// Remote synthesizers acknowledge before the file lands, so poll until
/// it exists and is non-empty, up to the configured timeout.
async fn wait_for_artifact(path: &Path, config: &PipelineConfig) -> WorkerResult<()> {
    let deadline = Instant::now() + config.artifact_poll_timeout;
    loop {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => return Ok(()),
            _ => {}
        }
        if Instant::now() >= deadline {
            return Err(WorkerError::MissingArtifact(path.to_path_buf()));
        }
        tokio::time::sleep(config.artifact_poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Synthesizer that fails a fixed number of times before writing.
    struct FlakySynth {
        failures: AtomicU32,
    }

    #[async_trait]
    impl SpeechSynthesizer for FlakySynth {
        async fn synthesize(&self, _cue: &DescriptionCue, output: &Path) -> WorkerResult<()> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(WorkerError::synthesis_failed("transient"));
            }
            tokio::fs::write(output, b"RIFF fake wav").await?;
            Ok(())
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            synthesis_retry_delay: Duration::from_millis(1),
            artifact_poll_interval: Duration::from_millis(1),
            artifact_poll_timeout: Duration::from_millis(50),
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_artifact_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.wav");
        let result = wait_for_artifact(&path, &fast_config()).await;
        assert!(matches!(result, Err(WorkerError::MissingArtifact(_))));
    }

    #[tokio::test]
    async fn test_artifact_found_once_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cue.wav");
        tokio::fs::write(&path, b"data").await.unwrap();
        wait_for_artifact(&path, &fast_config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fail_the_cue() {
        // Fails more times than the attempt budget
        let synth = FlakySynth {
            failures: AtomicU32::new(10),
        };
        let dir = tempfile::tempdir().unwrap();
        let cue = DescriptionCue::new(1.0, "text");
        let result = resolve_one(&synth, cue, dir.path().join("cue.wav"), &fast_config()).await;
        assert!(matches!(result, Err(WorkerError::SynthesisFailed(_))));
    }
}
