//! Recomposition pipeline.
//!
//! Drives the full run: probe the source, parse the narration script,
//! synthesize cues, allocate placements, build and verify the timeline,
//! match levels, render segments and join them. Cancellation is checked
//! between stages and forwarded into every ffmpeg invocation; the whole
//! run races a configurable deadline.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use vscribe_media::describe::{
    build_timeline, total_output_secs, CueAllocator, DescribeConfig, PlacementWarning, Segment,
    SegmentMixer, SilencePool,
};
use vscribe_media::{check_ffmpeg, check_ffprobe, probe_source_video, DescribeError, FfmpegRunner};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::music::MusicGenerator;
use crate::render::{self, MusicTrack, SegmentJob};
use crate::script;
use crate::synth::{resolve_cues, SpeechSynthesizer};

/// Outcome of a successful run.
#[derive(Debug)]
pub struct PipelineOutput {
    pub output_path: std::path::PathBuf,
    /// Degraded placements; the run still succeeded
    pub warnings: Vec<PlacementWarning>,
    pub output_duration_secs: f64,
}

/// Orchestrates one source video + script into a described program.
pub struct DescribePipeline {
    config: PipelineConfig,
    describe: DescribeConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    music: Option<Arc<dyn MusicGenerator>>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl DescribePipeline {
    pub fn new(
        config: PipelineConfig,
        describe: DescribeConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            config,
            describe,
            synthesizer,
            music: None,
            cancel_rx: None,
        }
    }

    /// Score narrated segments with generated music beds, one
    /// duration-matched bed per overlay or freeze.
    pub fn with_music(mut self, music: Arc<dyn MusicGenerator>) -> Self {
        self.music = Some(music);
        self
    }

    /// Attach a cancellation signal; checked between stages and inside
    /// every ffmpeg invocation.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Run the pipeline against its deadline.
    pub async fn run(
        &self,
        source: &Path,
        script_text: &str,
        output: &Path,
    ) -> WorkerResult<PipelineOutput> {
        let result =
            tokio::time::timeout(self.config.run_timeout, self.run_inner(source, script_text, output))
                .await;
        match result {
            Ok(Ok(out)) => {
                metrics::record_run_completed();
                Ok(out)
            }
            Ok(Err(e)) => {
                metrics::record_run_failed(failure_label(&e));
                Err(e)
            }
            Err(_) => {
                metrics::record_run_failed("timeout");
                Err(DescribeError::Timeout(self.config.run_timeout.as_secs()).into())
            }
        }
    }

    async fn run_inner(
        &self,
        source: &Path,
        script_text: &str,
        output: &Path,
    ) -> WorkerResult<PipelineOutput> {
        check_ffmpeg()?;
        check_ffprobe()?;

        let media = probe_source_video(source).await?;
        info!(
            source = %source.display(),
            duration_secs = media.duration,
            has_audio = media.has_audio,
            "Starting recomposition"
        );

        let script = script::parse_script(script_text, media.duration)?;
        self.check_cancelled()?;

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("vscribe-")
            .tempdir_in(&self.config.work_dir)?;

        let resolved = resolve_cues(
            Arc::clone(&self.synthesizer),
            script.cues,
            scratch.path(),
            &self.config,
        )
        .await?;
        self.check_cancelled()?;

        let pool = SilencePool::new(script.silences)?;
        let allocation = CueAllocator::new(pool, self.describe.clone()).allocate(resolved)?;
        metrics::record_placements(allocation.decisions.len(), allocation.warnings.len());
        for warning in &allocation.warnings {
            warn!(%warning, "Cue placed degraded");
        }

        let segments = build_timeline(&allocation.decisions, media.duration)?;
        let output_secs = total_output_secs(&segments);
        info!(
            segments = segments.len(),
            output_secs, "Timeline built and verified"
        );
        self.check_cancelled()?;

        let runner = Arc::new(self.runner());
        let jobs = self
            .prepare_jobs(&runner, source, media.has_audio, &segments, scratch.path())
            .await?;

        let rendered = render::render_segments(
            Arc::clone(&runner),
            source,
            media.has_audio,
            jobs,
            self.describe.edge_fade_secs,
            scratch.path(),
            self.config.max_ffmpeg_processes,
        )
        .await?;
        self.check_cancelled()?;

        render::concat_segments(&runner, &rendered, scratch.path(), output).await?;

        info!(
            output = %output.display(),
            warnings = allocation.warnings.len(),
            "Recomposition complete"
        );
        Ok(PipelineOutput {
            output_path: output.to_path_buf(),
            warnings: allocation.warnings,
            output_duration_secs: output_secs,
        })
    }

    /// Measure levels, generate per-segment music beds, and pair each
    /// segment with its render inputs.
    async fn prepare_jobs(
        &self,
        runner: &Arc<FfmpegRunner>,
        source: &Path,
        source_has_audio: bool,
        segments: &[Segment],
        scratch: &Path,
    ) -> WorkerResult<Vec<SegmentJob>> {
        let mixer = SegmentMixer::new(runner, &self.describe);
        let fades = render::edge_fades(segments);
        let mut jobs = Vec::with_capacity(segments.len());

        for (i, (segment, fades)) in segments.iter().zip(fades).enumerate() {
            let gain = match (segment.narration(), segment) {
                (Some(track), Segment::Overlay { start_secs, .. }) => {
                    self.check_cancelled()?;
                    mixer
                        .narration_gain_for(source, source_has_audio, *start_secs, track)
                        .await?
                }
                (Some(track), Segment::Freeze {
                    source_frame_secs, ..
                }) => {
                    self.check_cancelled()?;
                    mixer
                        .narration_gain_for(source, source_has_audio, *source_frame_secs, track)
                        .await?
                }
                _ => 1.0,
            };

            // Only narrated segments are scored
            let music = match (&self.music, segment.narration()) {
                (Some(generator), Some(_)) => {
                    self.check_cancelled()?;
                    let path = scratch.join(format!("bed_{:04}.wav", i));
                    generator
                        .generate(segment.output_duration_secs(), &path)
                        .await?;
                    let bed = mixer.music_bed_for(source, source_has_audio, &path).await?;
                    Some(MusicTrack { path, bed })
                }
                _ => None,
            };

            jobs.push(SegmentJob {
                segment: segment.clone(),
                gain,
                fades,
                music,
            });
        }
        Ok(jobs)
    }

    fn check_cancelled(&self) -> WorkerResult<()> {
        if let Some(rx) = &self.cancel_rx {
            if *rx.borrow() {
                return Err(DescribeError::Cancelled.into());
            }
        }
        Ok(())
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
    }
}

fn failure_label(error: &WorkerError) -> &'static str {
    match error {
        WorkerError::SynthesisFailed(_) => "synthesis",
        WorkerError::MissingArtifact(_) => "missing_artifact",
        WorkerError::MusicFailed(_) => "music",
        WorkerError::ScriptParse(_) => "script",
        WorkerError::ConfigError(_) => "config",
        WorkerError::Media(DescribeError::Cancelled) => "cancelled",
        WorkerError::Media(DescribeError::Timeout(_)) => "timeout",
        WorkerError::Media(_) => "media",
        WorkerError::Io(_) => "io",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_labels() {
        assert_eq!(
            failure_label(&WorkerError::synthesis_failed("x")),
            "synthesis"
        );
        assert_eq!(
            failure_label(&WorkerError::Media(DescribeError::Cancelled)),
            "cancelled"
        );
        assert_eq!(
            failure_label(&WorkerError::Media(DescribeError::Timeout(600))),
            "timeout"
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        struct NoopSynth;
        #[async_trait::async_trait]
        impl crate::synth::SpeechSynthesizer for NoopSynth {
            async fn synthesize(
                &self,
                _cue: &vscribe_models::DescriptionCue,
                _output: &Path,
            ) -> WorkerResult<()> {
                Ok(())
            }
        }

        let (tx, rx) = watch::channel(true);
        let pipeline = DescribePipeline::new(
            PipelineConfig::default(),
            DescribeConfig::default(),
            Arc::new(NoopSynth),
        )
        .with_cancel(rx);
        drop(tx);

        let err = pipeline.check_cancelled().unwrap_err();
        assert!(err.is_cancelled());
    }
}
