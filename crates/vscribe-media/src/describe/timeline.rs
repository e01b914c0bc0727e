//! Timeline builder: placement decisions to a gap-free segment list.
//!
//! The builder walks the ordered decisions with a monotonically
//! advancing cursor and emits `Passthrough`, `Overlay` and `Freeze`
//! segments. Passthrough/Overlay ranges tile the source timeline
//! exactly once; Freeze segments hold a single frame and add new output
//! time without consuming source range. `verify_timeline` re-checks the
//! tiling after construction; a violation is an allocator/builder bug
//! and fails the run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use vscribe_models::CueId;

use super::allocator::PlacementDecision;
use crate::error::{DescribeError, DescribeResult};

/// Tolerance for float comparison on the source timeline.
const EPS: f64 = 1e-6;

/// Narration audio attached to a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationTrack {
    /// Cue the audio belongs to
    pub cue_id: CueId,
    /// Synthesized narration artifact
    pub audio_path: PathBuf,
    /// Offset into the artifact at which this segment's share begins.
    /// Non-zero only for the freeze tail of an overflow placement.
    pub start_offset_secs: f64,
}

/// One unit of the output timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    /// Source video and audio copied unmodified.
    Passthrough { start_secs: f64, end_secs: f64 },
    /// Real video; original audio mixed with narration, or carried
    /// alone on the lead-in before a freeze (`narration: None`).
    Overlay {
        start_secs: f64,
        end_secs: f64,
        narration: Option<NarrationTrack>,
    },
    /// A still frame held for `duration_secs` of new output time.
    Freeze {
        source_frame_secs: f64,
        duration_secs: f64,
        narration: NarrationTrack,
    },
}

impl Segment {
    /// Output duration contributed by this segment.
    pub fn output_duration_secs(&self) -> f64 {
        match self {
            Segment::Passthrough {
                start_secs,
                end_secs,
            }
            | Segment::Overlay {
                start_secs,
                end_secs,
                ..
            } => end_secs - start_secs,
            Segment::Freeze { duration_secs, .. } => *duration_secs,
        }
    }

    /// Whether this segment carries narration to mix.
    pub fn narration(&self) -> Option<&NarrationTrack> {
        match self {
            Segment::Passthrough { .. } => None,
            Segment::Overlay { narration, .. } => narration.as_ref(),
            Segment::Freeze { narration, .. } => Some(narration),
        }
    }
}

/// Build the output timeline from ordered placement decisions.
///
/// Source-range spans are clamped at `source_duration`: a fallback
/// freeze placed past the end of the video holds the final frame
/// instead of reading past it.
pub fn build_timeline(
    decisions: &[PlacementDecision],
    source_duration: f64,
) -> DescribeResult<Vec<Segment>> {
    if source_duration <= 0.0 {
        return Err(DescribeError::invalid_input(format!(
            "Source duration must be positive, got {}",
            source_duration
        )));
    }

    let mut segments = Vec::new();
    // Committed point on the source timeline; may exceed source_duration
    // for fallback placements near the end.
    let mut cursor = 0.0_f64;

    let mut push_passthrough = |segments: &mut Vec<Segment>, from: f64, to: f64| {
        let start = from.min(source_duration);
        let end = to.min(source_duration);
        if end > start + EPS {
            segments.push(Segment::Passthrough {
                start_secs: start,
                end_secs: end,
            });
        }
    };

    for decision in decisions {
        let insertion = decision.insertion_time;
        let dur = decision.cue.audio_duration_secs;

        if insertion + EPS < cursor {
            return Err(DescribeError::timeline_invariant(format!(
                "Insertion at {:.3}s precedes committed cursor {:.3}s",
                insertion, cursor
            )));
        }
        if insertion > cursor {
            push_passthrough(&mut segments, cursor, insertion);
        }

        let track = |offset: f64| NarrationTrack {
            cue_id: decision.cue.id,
            audio_path: decision.cue.audio_path.clone(),
            start_offset_secs: offset,
        };

        match decision.freeze_time {
            None => {
                let end = insertion + dur;
                if end > source_duration + EPS {
                    return Err(DescribeError::timeline_invariant(format!(
                        "Overlay for cue {} runs past the source end ({:.3}s > {:.3}s)",
                        decision.cue.id, end, source_duration
                    )));
                }
                segments.push(Segment::Overlay {
                    start_secs: insertion,
                    end_secs: end,
                    narration: Some(track(0.0)),
                });
                cursor = end;
            }
            Some(freeze) if freeze + EPS < insertion => {
                return Err(DescribeError::timeline_invariant(format!(
                    "Freeze at {:.3}s precedes its insertion at {:.3}s",
                    freeze, insertion
                )));
            }
            Some(freeze) => {
                let lead = (freeze - insertion).max(0.0);
                let tail = dur - lead;

                if lead > EPS {
                    if tail > EPS {
                        // Real video up to the window end, original audio
                        // only; the narration tail rides the freeze.
                        segments.push(Segment::Overlay {
                            start_secs: insertion,
                            end_secs: freeze,
                            narration: None,
                        });
                    } else {
                        // Window length matches the narration exactly:
                        // degenerate freeze collapses into a plain overlay.
                        segments.push(Segment::Overlay {
                            start_secs: insertion,
                            end_secs: freeze,
                            narration: Some(track(0.0)),
                        });
                    }
                }
                if tail > EPS {
                    segments.push(Segment::Freeze {
                        source_frame_secs: freeze.min(source_duration),
                        duration_secs: tail,
                        narration: track(lead),
                    });
                }
                cursor = freeze;
            }
        }
    }

    if cursor < source_duration {
        push_passthrough(&mut segments, cursor, source_duration);
    }

    verify_timeline(&segments, source_duration)?;
    Ok(segments)
}

/// Check the structural invariants of a built timeline.
///
/// Passthrough/Overlay ranges must tile `[0, source_duration)` in order
/// with no gaps and no double coverage; every segment must have
/// positive duration; each freeze must sit exactly at the covered
/// point. Any violation is fatal.
pub fn verify_timeline(segments: &[Segment], source_duration: f64) -> DescribeResult<()> {
    let mut covered = 0.0_f64;

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Passthrough {
                start_secs,
                end_secs,
            }
            | Segment::Overlay {
                start_secs,
                end_secs,
                ..
            } => {
                if *end_secs <= *start_secs + EPS {
                    return Err(DescribeError::timeline_invariant(format!(
                        "Segment {} has non-positive duration [{:.3}, {:.3})",
                        i, start_secs, end_secs
                    )));
                }
                if (*start_secs - covered).abs() > EPS {
                    return Err(DescribeError::timeline_invariant(format!(
                        "Segment {} starts at {:.3}s but coverage ends at {:.3}s",
                        i, start_secs, covered
                    )));
                }
                covered = *end_secs;
            }
            Segment::Freeze {
                source_frame_secs,
                duration_secs,
                ..
            } => {
                if *duration_secs <= EPS {
                    return Err(DescribeError::timeline_invariant(format!(
                        "Freeze segment {} has non-positive duration {:.3}",
                        i, duration_secs
                    )));
                }
                if (*source_frame_secs - covered).abs() > EPS {
                    return Err(DescribeError::timeline_invariant(format!(
                        "Freeze segment {} holds frame {:.3}s away from coverage at {:.3}s",
                        i, source_frame_secs, covered
                    )));
                }
            }
        }
    }

    if (covered - source_duration).abs() > EPS {
        return Err(DescribeError::timeline_invariant(format!(
            "Coverage ends at {:.3}s, source duration is {:.3}s",
            covered, source_duration
        )));
    }

    Ok(())
}

/// Total output duration of a timeline.
pub fn total_output_secs(segments: &[Segment]) -> f64 {
    segments.iter().map(|s| s.output_duration_secs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vscribe_models::{DescriptionCue, ResolvedCue};

    fn decision(ts: f64, dur: f64, insertion: f64, freeze: Option<f64>) -> PlacementDecision {
        PlacementDecision {
            cue: ResolvedCue::from_draft(
                DescriptionCue::new(ts, "narration"),
                PathBuf::from("/tmp/cue.wav"),
                dur,
            ),
            insertion_time: insertion,
            freeze_time: freeze,
        }
    }

    #[test]
    fn test_pure_overlay() {
        let segments =
            build_timeline(&[decision(12.0, 3.0, 12.0, None)], 60.0).unwrap();
        assert_eq!(segments.len(), 3);
        assert!(matches!(
            segments[0],
            Segment::Passthrough { start_secs, end_secs } if start_secs == 0.0 && end_secs == 12.0
        ));
        assert!(matches!(
            &segments[1],
            Segment::Overlay { start_secs, end_secs, narration: Some(_) }
                if *start_secs == 12.0 && *end_secs == 15.0
        ));
        assert!(matches!(
            segments[2],
            Segment::Passthrough { start_secs, end_secs } if start_secs == 15.0 && end_secs == 60.0
        ));
        assert!((total_output_secs(&segments) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_immediate_freeze() {
        let segments =
            build_timeline(&[decision(10.0, 2.0, 10.0, Some(10.0))], 30.0).unwrap();
        assert_eq!(segments.len(), 3);
        match &segments[1] {
            Segment::Freeze {
                source_frame_secs,
                duration_secs,
                narration,
            } => {
                assert_eq!(*source_frame_secs, 10.0);
                assert_eq!(*duration_secs, 2.0);
                assert_eq!(narration.start_offset_secs, 0.0);
            }
            other => panic!("expected freeze, got {:?}", other),
        }
        // Freeze adds output time on top of the source
        assert!((total_output_secs(&segments) - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_overflow_splits_into_overlay_and_freeze() {
        // Real video 18..20, then 3s of frozen overflow
        let segments =
            build_timeline(&[decision(18.0, 5.0, 18.0, Some(20.0))], 40.0).unwrap();
        assert_eq!(segments.len(), 4);
        assert!(matches!(
            &segments[1],
            Segment::Overlay { start_secs, end_secs, narration: None }
                if *start_secs == 18.0 && *end_secs == 20.0
        ));
        match &segments[2] {
            Segment::Freeze {
                source_frame_secs,
                duration_secs,
                narration,
            } => {
                assert_eq!(*source_frame_secs, 20.0);
                assert!((duration_secs - 3.0).abs() < 1e-9);
                assert!((narration.start_offset_secs - 2.0).abs() < 1e-9);
            }
            other => panic!("expected freeze, got {:?}", other),
        }
        assert!((total_output_secs(&segments) - 43.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_fit_overflow_collapses_to_overlay() {
        // Window length equals the narration: no zero-length freeze
        let segments =
            build_timeline(&[decision(10.0, 2.0, 10.0, Some(12.0))], 30.0).unwrap();
        assert_eq!(segments.len(), 3);
        assert!(matches!(
            &segments[1],
            Segment::Overlay { narration: Some(_), .. }
        ));
    }

    #[test]
    fn test_fallback_freeze_past_source_end_holds_last_frame() {
        let segments =
            build_timeline(&[decision(40.0, 2.0, 30.2, Some(30.2))], 30.0).unwrap();
        // Passthrough to the end, then the freeze clamped onto the last frame
        assert_eq!(segments.len(), 2);
        assert!(matches!(
            segments[0],
            Segment::Passthrough { end_secs, .. } if end_secs == 30.0
        ));
        assert!(matches!(
            segments[1],
            Segment::Freeze { source_frame_secs, .. } if source_frame_secs == 30.0
        ));
    }

    #[test]
    fn test_non_monotonic_decisions_rejected() {
        let decisions = vec![
            decision(10.0, 2.0, 10.0, None),
            decision(5.0, 1.0, 5.0, None),
        ];
        let result = build_timeline(&decisions, 30.0);
        assert!(matches!(result, Err(DescribeError::TimelineInvariant(_))));
    }

    #[test]
    fn test_freeze_before_insertion_rejected() {
        let result = build_timeline(&[decision(10.0, 2.0, 10.0, Some(8.0))], 30.0);
        assert!(matches!(result, Err(DescribeError::TimelineInvariant(_))));
    }

    #[test]
    fn test_overlay_past_source_end_rejected() {
        let result = build_timeline(&[decision(29.0, 5.0, 29.0, None)], 30.0);
        assert!(matches!(result, Err(DescribeError::TimelineInvariant(_))));
    }

    #[test]
    fn test_invalid_source_duration() {
        let result = build_timeline(&[], 0.0);
        assert!(matches!(result, Err(DescribeError::InvalidInput(_))));
    }

    #[test]
    fn test_verify_rejects_gap() {
        let segments = vec![
            Segment::Passthrough {
                start_secs: 0.0,
                end_secs: 10.0,
            },
            Segment::Passthrough {
                start_secs: 12.0,
                end_secs: 30.0,
            },
        ];
        assert!(verify_timeline(&segments, 30.0).is_err());
    }

    #[test]
    fn test_verify_rejects_double_coverage() {
        let segments = vec![
            Segment::Passthrough {
                start_secs: 0.0,
                end_secs: 10.0,
            },
            Segment::Passthrough {
                start_secs: 8.0,
                end_secs: 30.0,
            },
        ];
        assert!(verify_timeline(&segments, 30.0).is_err());
    }

    #[test]
    fn test_verify_rejects_incomplete_coverage() {
        let segments = vec![Segment::Passthrough {
            start_secs: 0.0,
            end_secs: 10.0,
        }];
        assert!(verify_timeline(&segments, 30.0).is_err());
    }

    #[test]
    fn test_end_to_end_output_duration() {
        // Mirrors the allocator's three-cue scenario: two overlays and
        // one fallback freeze of 2s
        let decisions = vec![
            decision(2.0, 1.0, 2.0, None),
            decision(10.0, 4.0, 10.0, None),
            decision(18.0, 2.0, 14.5, Some(14.5)),
        ];
        let segments = build_timeline(&decisions, 20.0).unwrap();
        verify_timeline(&segments, 20.0).unwrap();
        assert!((total_output_secs(&segments) - 22.0).abs() < 1e-9);

        // Ordering is preserved and each narration-bearing segment knows
        // its cue
        let narrated: Vec<_> = segments.iter().filter_map(|s| s.narration()).collect();
        assert_eq!(narrated.len(), 3);
    }
}
