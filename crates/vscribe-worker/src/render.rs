//! Segment rendering and concatenation.
//!
//! Each timeline segment renders to its own mp4 with uniform encode
//! parameters, then the pieces are joined with the concat demuxer and
//! stream copy. Source-range segments use two-pass seeking (fast input
//! seek to get close, accurate output seek from there) so cuts land on
//! the requested frame instead of the nearest keyframe.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info};

use vscribe_media::describe::mixer::{self, EdgeFades, MusicBed};
use vscribe_media::describe::{NarrationTrack, Segment};
use vscribe_media::{FfmpegCommand, FfmpegRunner};

use crate::error::{WorkerError, WorkerResult};

/// Silent stereo source for videos without an audio stream.
const ANULLSRC: &str = "anullsrc=channel_layout=stereo:sample_rate=44100";

/// Fast-seek margin before the accurate output seek.
const FAST_SEEK_MARGIN_SECS: f64 = 5.0;

/// One segment plus everything its render needs.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub segment: Segment,
    /// Narration gain; unused for passthrough segments
    pub gain: f64,
    /// Edge fades on the segment's original audio
    pub fades: EdgeFades,
    /// Generated music bed for this segment, narrated segments only
    pub music: Option<MusicTrack>,
}

/// A generated music bed artifact plus its mix parameters.
#[derive(Debug, Clone)]
pub struct MusicTrack {
    pub path: PathBuf,
    pub bed: MusicBed,
}

/// Compute the edge fades for each segment: original audio fades out
/// into a freeze and back in coming out of one.
pub fn edge_fades(segments: &[Segment]) -> Vec<EdgeFades> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if matches!(segment, Segment::Freeze { .. }) {
                return EdgeFades::default();
            }
            EdgeFades {
                fade_in_head: i > 0 && matches!(segments[i - 1], Segment::Freeze { .. }),
                fade_out_tail: segments
                    .get(i + 1)
                    .map(|s| matches!(s, Segment::Freeze { .. }))
                    .unwrap_or(false),
            }
        })
        .collect()
}

fn two_pass_seek(start_secs: f64) -> (f64, f64) {
    let fast = (start_secs - FAST_SEEK_MARGIN_SECS).max(0.0);
    (fast, start_secs - fast)
}

/// Shared encode parameters so the concat demuxer can stream-copy the
/// joined segments.
fn encoded(cmd: FfmpegCommand) -> FfmpegCommand {
    cmd.video_codec("libx264")
        .output_args(["-preset", "veryfast", "-crf", "20"])
        .audio_codec("aac")
        .output_args(["-b:a", "128k", "-ar", "44100", "-ac", "2"])
        .output_args(["-avoid_negative_ts", "make_zero"])
}

/// Subclip of the source, original audio carried through (with edge
/// fades when the segment borders a freeze).
pub(crate) fn passthrough_command(
    source: &Path,
    source_has_audio: bool,
    start_secs: f64,
    end_secs: f64,
    fades: EdgeFades,
    fade_secs: f64,
    output: &Path,
) -> FfmpegCommand {
    let duration = end_secs - start_secs;
    let (fast, accurate) = two_pass_seek(start_secs);

    let mut cmd = FfmpegCommand::new(output)
        .seeked_input(source, fast, None)
        .output_args(["-ss".to_string(), format!("{:.3}", accurate)])
        .duration(duration);

    if source_has_audio {
        if let Some(filter) = mixer::original_edge_filter(fades, duration, fade_secs) {
            cmd = cmd.audio_filter(filter);
        }
    } else {
        cmd = cmd
            .input_with_args(["-f", "lavfi", "-t", &format!("{:.3}", duration)], ANULLSRC)
            .map("0:v")
            .map("1:a");
    }

    encoded(cmd)
}

/// Subclip with narration (and an optional music bed) mixed over the
/// original audio.
pub(crate) fn overlay_command(
    source: &Path,
    source_has_audio: bool,
    start_secs: f64,
    end_secs: f64,
    narration: &NarrationTrack,
    gain: f64,
    fades: EdgeFades,
    fade_secs: f64,
    music: Option<&MusicTrack>,
    output: &Path,
) -> FfmpegCommand {
    let duration = end_secs - start_secs;
    let bed = music.map(|m| m.bed);

    let graph = if source_has_audio {
        mixer::overlay_mix_graph(gain, narration, duration, fades, fade_secs, bed)
    } else {
        // No original track to mix against; the narration is the audio
        mixer::freeze_audio_graph(gain, narration, duration, bed)
    };

    let mut cmd = FfmpegCommand::new(output)
        .seeked_input(source, start_secs, Some(duration))
        .input(&narration.audio_path);
    if let Some(m) = music {
        cmd = cmd.input(&m.path);
    }
    encoded(
        cmd.filter_complex(graph)
            .map("0:v")
            .map("[aout]")
            .duration(duration),
    )
}

/// Extract the frame a freeze will hold.
pub(crate) fn frame_extract_command(source: &Path, at_secs: f64, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .seeked_input(source, at_secs, None)
        .output_args(["-frames:v", "1", "-q:v", "2"])
}

/// Still frame held for the narration tail, with the optional music
/// bed underneath.
pub(crate) fn freeze_command(
    frame: &Path,
    narration: &NarrationTrack,
    gain: f64,
    duration_secs: f64,
    music: Option<&MusicTrack>,
    output: &Path,
) -> FfmpegCommand {
    let graph = mixer::freeze_audio_graph(gain, narration, duration_secs, music.map(|m| m.bed));
    let mut cmd = FfmpegCommand::new(output)
        .input_with_args(["-loop", "1", "-framerate", "30"], frame)
        .input(&narration.audio_path);
    if let Some(m) = music {
        cmd = cmd.input(&m.path);
    }
    encoded(
        cmd.filter_complex(graph)
            .map("0:v")
            .map("[aout]")
            .output_args(["-pix_fmt", "yuv420p"])
            .duration(duration_secs),
    )
}

/// Join rendered segments with the concat demuxer and stream copy.
pub(crate) fn concat_command(list: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input_with_args(["-f", "concat", "-safe", "0"], list)
        .output_args(["-c", "copy", "-movflags", "+faststart"])
}

/// Render all segments in parallel, bounded by `max_parallel` ffmpeg
/// processes. Returns the rendered paths in timeline order.
pub async fn render_segments(
    runner: Arc<FfmpegRunner>,
    source: &Path,
    source_has_audio: bool,
    jobs: Vec<SegmentJob>,
    fade_secs: f64,
    work_dir: &Path,
    max_parallel: usize,
) -> WorkerResult<Vec<PathBuf>> {
    info!(
        segments = jobs.len(),
        max_parallel, "Rendering timeline segments"
    );
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut handles = Vec::with_capacity(jobs.len());

    for (i, job) in jobs.into_iter().enumerate() {
        let runner = Arc::clone(&runner);
        let semaphore = Arc::clone(&semaphore);
        let source = source.to_path_buf();
        let out = work_dir.join(format!("seg_{:04}.mp4", i));
        let frame = work_dir.join(format!("seg_{:04}_frame.png", i));

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| WorkerError::config_error("Render pool closed"))?;
            render_one(&runner, &source, source_has_audio, &job, fade_secs, &frame, &out).await?;
            Ok::<PathBuf, WorkerError>(out)
        }));
    }

    let mut rendered = Vec::with_capacity(handles.len());
    for handle in handles {
        let path = handle
            .await
            .map_err(|e| WorkerError::config_error(format!("Render task panicked: {}", e)))??;
        rendered.push(path);
    }
    Ok(rendered)
}

async fn render_one(
    runner: &FfmpegRunner,
    source: &Path,
    source_has_audio: bool,
    job: &SegmentJob,
    fade_secs: f64,
    frame_path: &Path,
    output: &Path,
) -> WorkerResult<()> {
    debug!(segment = ?job.segment, output = %output.display(), "Rendering segment");

    match &job.segment {
        Segment::Passthrough {
            start_secs,
            end_secs,
        } => {
            let cmd = passthrough_command(
                source,
                source_has_audio,
                *start_secs,
                *end_secs,
                job.fades,
                fade_secs,
                output,
            );
            runner.run(&cmd).await?;
        }
        Segment::Overlay {
            start_secs,
            end_secs,
            narration: None,
        } => {
            // Original audio only; behaves like a passthrough with fades
            let cmd = passthrough_command(
                source,
                source_has_audio,
                *start_secs,
                *end_secs,
                job.fades,
                fade_secs,
                output,
            );
            runner.run(&cmd).await?;
        }
        Segment::Overlay {
            start_secs,
            end_secs,
            narration: Some(track),
        } => {
            let cmd = overlay_command(
                source,
                source_has_audio,
                *start_secs,
                *end_secs,
                track,
                job.gain,
                job.fades,
                fade_secs,
                job.music.as_ref(),
                output,
            );
            runner.run(&cmd).await?;
        }
        Segment::Freeze {
            source_frame_secs,
            duration_secs,
            narration,
        } => {
            runner
                .run(&frame_extract_command(source, *source_frame_secs, frame_path))
                .await?;
            let cmd = freeze_command(
                frame_path,
                narration,
                job.gain,
                *duration_secs,
                job.music.as_ref(),
                output,
            );
            runner.run(&cmd).await?;
        }
    }
    Ok(())
}

/// Concatenate rendered segments into the final program file.
pub async fn concat_segments(
    runner: &FfmpegRunner,
    segments: &[PathBuf],
    work_dir: &Path,
    output: &Path,
) -> WorkerResult<()> {
    if segments.is_empty() {
        return Err(WorkerError::config_error("No segments to concatenate"));
    }

    let list_path = work_dir.join("concat.txt");
    let list: String = segments
        .iter()
        .map(|p| format!("file '{}'\n", p.display()))
        .collect();
    tokio::fs::write(&list_path, &list).await?;

    runner.run(&concat_command(&list_path, output)).await?;
    info!(segments = segments.len(), output = %output.display(), "Concat complete");
    Ok(())
}
