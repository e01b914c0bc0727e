//! Per-segment audio compositing.
//!
//! Narration clips arrive at whatever level the synthesis voice
//! produced, so each one is matched to the loudness of the source audio
//! around its insertion point before mixing. Peaks are measured with
//! ffmpeg's `volumedetect` filter; everything downstream of the
//! measurement (gain math, filter graphs) is pure and unit tested.

use std::path::Path;

use tracing::debug;

use super::config::DescribeConfig;
use super::timeline::NarrationTrack;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::DescribeResult;

/// Linear peaks below this are treated as silence (~ -80 dBFS).
const SILENCE_FLOOR: f64 = 1e-4;

/// Convert a dBFS value to a linear amplitude factor.
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Extract the `max_volume` reading from volumedetect stderr output.
///
/// The filter reports lines like
/// `[Parsed_volumedetect_0 @ 0x...] max_volume: -12.3 dB`.
pub(crate) fn parse_max_volume_db(stderr: &str) -> Option<f64> {
    stderr.lines().find_map(|line| {
        let rest = line.split("max_volume:").nth(1)?;
        rest.trim().trim_end_matches("dB").trim().parse::<f64>().ok()
    })
}

/// Measure the linear peak of a whole audio file.
///
/// Returns 0.0 when volumedetect reports nothing (no audio frames).
pub async fn measure_peak(runner: &FfmpegRunner, path: &Path) -> DescribeResult<f64> {
    let cmd = FfmpegCommand::analysis()
        .input(path)
        .output_arg("-vn")
        .audio_filter("volumedetect");
    let stderr = runner.run_capture_stderr(&cmd).await?;
    Ok(parse_max_volume_db(&stderr)
        .map(db_to_linear)
        .unwrap_or(0.0))
}

/// Measure the linear peak of the source audio in a window centered on
/// `center_secs`, extending `half_window_secs` to either side (clamped
/// at the start of the file).
pub async fn measure_peak_window(
    runner: &FfmpegRunner,
    path: &Path,
    center_secs: f64,
    half_window_secs: f64,
) -> DescribeResult<f64> {
    let start = (center_secs - half_window_secs).max(0.0);
    let cmd = FfmpegCommand::analysis()
        .seeked_input(path, start, Some(half_window_secs * 2.0))
        .output_arg("-vn")
        .audio_filter("volumedetect");
    let stderr = runner.run_capture_stderr(&cmd).await?;
    Ok(parse_max_volume_db(&stderr)
        .map(db_to_linear)
        .unwrap_or(0.0))
}

/// Gain that brings the narration peak up or down to the original peak.
///
/// A silent source window falls back to the narration's own peak, which
/// leaves the narration untouched; a silent narration clip also gets
/// unity gain since scaling silence is meaningless.
pub fn narration_gain(original_peak: f64, narration_peak: f64) -> f64 {
    if narration_peak <= SILENCE_FLOOR {
        return 1.0;
    }
    let target = if original_peak <= SILENCE_FLOOR {
        narration_peak
    } else {
        original_peak
    };
    target / narration_peak
}

/// Gain for the background music bed: matched to the original peak,
/// then scaled to the configured bed level and ducked under the voice.
pub fn music_gain(original_peak: f64, music_peak: f64, level: f64, ducking: f64) -> f64 {
    if music_peak <= SILENCE_FLOOR {
        return 0.0;
    }
    let target = if original_peak <= SILENCE_FLOOR {
        music_peak
    } else {
        original_peak
    };
    (target / music_peak) * level * ducking
}

/// A music bed ready to mix under one segment: measured gain plus the
/// fade length applied at the segment's edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicBed {
    pub gain: f64,
    pub fade_secs: f64,
}

/// Which edges of a segment's original audio get a fade.
///
/// A freeze pauses the source, so the original audio fades out over the
/// tail of whatever plays before the freeze and back in over the head
/// of whatever plays after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeFades {
    pub fade_in_head: bool,
    pub fade_out_tail: bool,
}

impl EdgeFades {
    pub fn none(&self) -> bool {
        !self.fade_in_head && !self.fade_out_tail
    }
}

/// Fade chain for a segment's original audio, or `None` when no edge
/// needs fading. Fades shrink on segments too short to hold both.
pub fn original_edge_filter(
    fades: EdgeFades,
    segment_secs: f64,
    fade_secs: f64,
) -> Option<String> {
    if fades.none() || segment_secs <= 0.0 {
        return None;
    }
    let fade = fade_secs.min(segment_secs / 2.0);
    let mut parts = Vec::new();
    if fades.fade_in_head {
        parts.push(format!("afade=t=in:st=0:d={:.3}", fade));
    }
    if fades.fade_out_tail {
        parts.push(format!(
            "afade=t=out:st={:.3}:d={:.3}",
            segment_secs - fade,
            fade
        ));
    }
    Some(parts.join(","))
}

/// Chain that prepares a narration input for mixing: trim to the
/// segment's share of the clip, reset timestamps, apply the matching
/// gain.
fn narration_chain(gain: f64, offset_secs: f64) -> String {
    let mut chain = String::new();
    if offset_secs > 0.0 {
        chain.push_str(&format!(
            "atrim=start={:.3},asetpts=PTS-STARTPTS,",
            offset_secs
        ));
    }
    chain.push_str(&format!("volume={:.4}", gain));
    chain
}

/// Chain that prepares a segment-length music bed: ducked gain plus a
/// fade in and out at the segment's edges.
fn music_chain(bed: MusicBed, segment_secs: f64) -> String {
    let fade = bed.fade_secs.min(segment_secs / 2.0);
    format!(
        "volume={:.4},afade=t=in:st=0:d={:.3},afade=t=out:st={:.3}:d={:.3}",
        bed.gain,
        fade,
        segment_secs - fade,
        fade
    )
}

/// Filter graph for an overlay segment: source audio on input 0 (with
/// edge fades when the segment borders a freeze), narration on input 1,
/// the optional music bed on input 2, mixed without renormalization so
/// the matched levels survive.
pub fn overlay_mix_graph(
    gain: f64,
    narration: &NarrationTrack,
    segment_secs: f64,
    fades: EdgeFades,
    fade_secs: f64,
    music: Option<MusicBed>,
) -> String {
    let nar = narration_chain(gain, narration.start_offset_secs);
    let orig = original_edge_filter(fades, segment_secs, fade_secs)
        .unwrap_or_else(|| "anull".to_string());
    match music {
        Some(bed) => format!(
            "[1:a]{}[nar];[0:a]{}[orig];[2:a]{}[bed];\
             [orig][nar][bed]amix=inputs=3:duration=first:normalize=0[aout]",
            nar,
            orig,
            music_chain(bed, segment_secs)
        ),
        None => format!(
            "[1:a]{}[nar];[0:a]{}[orig];[orig][nar]amix=inputs=2:duration=first:normalize=0[aout]",
            nar, orig
        ),
    }
}

/// Filter graph for a freeze segment: the held frame carries no source
/// audio, so the output is the narration tail at matched gain, with the
/// optional music bed (input 2) underneath.
pub fn freeze_audio_graph(
    gain: f64,
    narration: &NarrationTrack,
    segment_secs: f64,
    music: Option<MusicBed>,
) -> String {
    let nar = narration_chain(gain, narration.start_offset_secs);
    match music {
        Some(bed) => format!(
            "[1:a]{}[nar];[2:a]{}[bed];[nar][bed]amix=inputs=2:duration=first:normalize=0[aout]",
            nar,
            music_chain(bed, segment_secs)
        ),
        None => format!("[1:a]{}[aout]", nar),
    }
}

/// Measures peaks and derives the narration gain for one segment.
pub struct SegmentMixer<'a> {
    runner: &'a FfmpegRunner,
    config: &'a DescribeConfig,
}

impl<'a> SegmentMixer<'a> {
    pub fn new(runner: &'a FfmpegRunner, config: &'a DescribeConfig) -> Self {
        Self { runner, config }
    }

    /// Gain that matches `narration` to the source loudness around the
    /// insertion point. Sources without an audio stream measure as
    /// silent and fall through to unity.
    pub async fn narration_gain_for(
        &self,
        source: &Path,
        source_has_audio: bool,
        insertion_secs: f64,
        narration: &NarrationTrack,
    ) -> DescribeResult<f64> {
        let narration_peak = measure_peak(self.runner, &narration.audio_path).await?;
        let original_peak = if source_has_audio {
            measure_peak_window(
                self.runner,
                source,
                insertion_secs,
                self.config.peak_window_secs,
            )
            .await?
        } else {
            0.0
        };
        let gain = narration_gain(original_peak, narration_peak);
        debug!(
            cue_id = %narration.cue_id,
            original_peak,
            narration_peak,
            gain,
            "Matched narration level"
        );
        Ok(gain)
    }

    /// Mix parameters for a music bed layered under one narrated
    /// segment. The bed is matched against the source's overall peak,
    /// as the voice already tracks the local level.
    pub async fn music_bed_for(
        &self,
        source: &Path,
        source_has_audio: bool,
        music: &Path,
    ) -> DescribeResult<MusicBed> {
        let music_peak = measure_peak(self.runner, music).await?;
        let original_peak = if source_has_audio {
            measure_peak(self.runner, source).await?
        } else {
            0.0
        };
        Ok(MusicBed {
            gain: music_gain(
                original_peak,
                music_peak,
                self.config.music_level,
                self.config.music_ducking,
            ),
            fade_secs: self.config.music_fade_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vscribe_models::CueId;

    fn track(offset: f64) -> NarrationTrack {
        NarrationTrack {
            cue_id: CueId::new(),
            audio_path: PathBuf::from("/tmp/cue.wav"),
            start_offset_secs: offset,
        }
    }

    #[test]
    fn test_parse_max_volume() {
        let stderr = "\
[Parsed_volumedetect_0 @ 0x5593] n_samples: 480000
[Parsed_volumedetect_0 @ 0x5593] mean_volume: -24.1 dB
[Parsed_volumedetect_0 @ 0x5593] max_volume: -6.5 dB
[Parsed_volumedetect_0 @ 0x5593] histogram_6db: 42";
        assert_eq!(parse_max_volume_db(stderr), Some(-6.5));
    }

    #[test]
    fn test_parse_max_volume_missing() {
        assert_eq!(parse_max_volume_db("frame=  100 fps=0.0"), None);
    }

    #[test]
    fn test_db_to_linear() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-9);
        assert!((db_to_linear(-6.0) - 0.501).abs() < 1e-3);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_narration_gain_matches_original() {
        let gain = narration_gain(0.5, 0.25);
        assert!((gain - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_narration_gain_silent_source_is_unity() {
        assert_eq!(narration_gain(0.0, 0.5), 1.0);
    }

    #[test]
    fn test_narration_gain_silent_narration_is_unity() {
        assert_eq!(narration_gain(0.5, 0.0), 1.0);
        assert_eq!(narration_gain(0.0, 0.0), 1.0);
    }

    #[test]
    fn test_music_gain_scaled_and_ducked() {
        let gain = music_gain(0.8, 0.4, 0.5, 0.12);
        assert!((gain - 2.0 * 0.5 * 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_music_gain_silent_bed_is_zero() {
        assert_eq!(music_gain(0.8, 0.0, 0.5, 0.12), 0.0);
    }

    #[test]
    fn test_edge_filter_both_edges() {
        let fades = EdgeFades {
            fade_in_head: true,
            fade_out_tail: true,
        };
        let filter = original_edge_filter(fades, 10.0, 0.2).unwrap();
        assert_eq!(
            filter,
            "afade=t=in:st=0:d=0.200,afade=t=out:st=9.800:d=0.200"
        );
    }

    #[test]
    fn test_edge_filter_shrinks_on_short_segment() {
        let fades = EdgeFades {
            fade_in_head: false,
            fade_out_tail: true,
        };
        let filter = original_edge_filter(fades, 0.2, 0.2).unwrap();
        assert_eq!(filter, "afade=t=out:st=0.100:d=0.100");
    }

    #[test]
    fn test_edge_filter_none() {
        assert_eq!(original_edge_filter(EdgeFades::default(), 10.0, 0.2), None);
    }

    #[test]
    fn test_overlay_graph_without_fades() {
        let graph = overlay_mix_graph(1.5, &track(0.0), 3.0, EdgeFades::default(), 0.2, None);
        assert_eq!(
            graph,
            "[1:a]volume=1.5000[nar];[0:a]anull[orig];\
             [orig][nar]amix=inputs=2:duration=first:normalize=0[aout]"
        );
    }

    #[test]
    fn test_overlay_graph_with_offset_trims_narration() {
        let graph = overlay_mix_graph(1.0, &track(2.0), 3.0, EdgeFades::default(), 0.2, None);
        assert!(graph.starts_with("[1:a]atrim=start=2.000,asetpts=PTS-STARTPTS,volume=1.0000[nar]"));
    }

    #[test]
    fn test_overlay_graph_with_music_mixes_three_inputs() {
        let bed = MusicBed {
            gain: 0.06,
            fade_secs: 0.5,
        };
        let graph = overlay_mix_graph(1.0, &track(0.0), 3.0, EdgeFades::default(), 0.2, Some(bed));
        assert!(graph.contains("[2:a]volume=0.0600,afade=t=in:st=0:d=0.500"));
        assert!(graph.contains("afade=t=out:st=2.500:d=0.500[bed]"));
        assert!(graph.ends_with("[orig][nar][bed]amix=inputs=3:duration=first:normalize=0[aout]"));
    }

    #[test]
    fn test_freeze_graph_carries_tail_offset() {
        let graph = freeze_audio_graph(0.8, &track(1.5), 2.0, None);
        assert_eq!(
            graph,
            "[1:a]atrim=start=1.500,asetpts=PTS-STARTPTS,volume=0.8000[aout]"
        );
    }

    #[test]
    fn test_freeze_graph_with_music_ducks_bed_under_voice() {
        let bed = MusicBed {
            gain: 0.06,
            fade_secs: 0.5,
        };
        let graph = freeze_audio_graph(1.0, &track(0.0), 2.5, Some(bed));
        assert!(graph.starts_with("[1:a]volume=1.0000[nar];[2:a]volume=0.0600"));
        assert!(graph.contains("afade=t=out:st=2.000:d=0.500[bed]"));
        assert!(graph.ends_with("[nar][bed]amix=inputs=2:duration=first:normalize=0[aout]"));
    }

    #[test]
    fn test_music_fade_shrinks_on_short_segment() {
        let bed = MusicBed {
            gain: 0.06,
            fade_secs: 0.5,
        };
        let graph = freeze_audio_graph(1.0, &track(0.0), 0.6, Some(bed));
        assert!(graph.contains("afade=t=in:st=0:d=0.300"));
        assert!(graph.contains("afade=t=out:st=0.300:d=0.300"));
    }
}
