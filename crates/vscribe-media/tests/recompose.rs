//! End-to-end placement tests: silence pool through allocation to a
//! verified timeline, without touching ffmpeg.

use std::path::PathBuf;

use vscribe_media::describe::{
    build_timeline, total_output_secs, verify_timeline, CueAllocator, DescribeConfig, Segment,
    SilenceInterval, SilencePool,
};
use vscribe_models::{DescriptionCue, ResolvedCue};

fn cue(ts: f64, dur: f64) -> ResolvedCue {
    ResolvedCue::from_draft(
        DescriptionCue::new(ts, "narration"),
        PathBuf::from("/tmp/cue.wav"),
        dur,
    )
}

fn pool(windows: &[(f64, f64)]) -> SilencePool {
    let intervals = windows
        .iter()
        .map(|&(a, b)| SilenceInterval::new(a, b).unwrap())
        .collect();
    SilencePool::new(intervals).unwrap()
}

#[test]
fn three_cue_program_produces_verified_timeline() {
    // Cues at 2, 10 and 18 against two silence windows; the third cue
    // finds nothing usable and falls back to a freeze.
    let pool = pool(&[(0.0, 3.0), (9.0, 15.0)]);
    let cues = vec![cue(2.0, 1.0), cue(10.0, 4.0), cue(18.0, 2.0)];
    let source_duration = 20.0;

    let allocation = CueAllocator::new(pool, DescribeConfig::default())
        .allocate(cues)
        .unwrap();
    assert_eq!(allocation.warnings.len(), 1);

    let segments = build_timeline(&allocation.decisions, source_duration).unwrap();
    verify_timeline(&segments, source_duration).unwrap();

    // Output grows by exactly the frozen narration time
    let frozen: f64 = segments
        .iter()
        .filter_map(|s| match s {
            Segment::Freeze { duration_secs, .. } => Some(*duration_secs),
            _ => None,
        })
        .sum();
    assert!(frozen > 0.0);
    assert!((total_output_secs(&segments) - (source_duration + frozen)).abs() < 1e-6);
}

#[test]
fn all_cues_fit_in_silence_adds_no_output_time() {
    let pool = pool(&[(0.0, 5.0), (10.0, 20.0)]);
    let cues = vec![cue(1.0, 2.0), cue(12.0, 3.0)];
    let source_duration = 30.0;

    let allocation = CueAllocator::new(pool, DescribeConfig::default())
        .allocate(cues)
        .unwrap();
    assert!(allocation.warnings.is_empty());

    let segments = build_timeline(&allocation.decisions, source_duration).unwrap();
    verify_timeline(&segments, source_duration).unwrap();
    assert!((total_output_secs(&segments) - source_duration).abs() < 1e-6);
    assert!(!segments.iter().any(|s| matches!(s, Segment::Freeze { .. })));
}

#[test]
fn always_freeze_strategy_freezes_every_cue() {
    let pool = pool(&[(0.0, 30.0)]);
    let cues = vec![cue(5.0, 2.0), cue(12.0, 1.5)];
    let source_duration = 30.0;

    let allocation = CueAllocator::new(pool, DescribeConfig::always_freeze())
        .allocate(cues)
        .unwrap();

    let segments = build_timeline(&allocation.decisions, source_duration).unwrap();
    let freezes = segments
        .iter()
        .filter(|s| matches!(s, Segment::Freeze { .. }))
        .count();
    assert_eq!(freezes, 2);
    assert!((total_output_secs(&segments) - 33.5).abs() < 1e-6);
}
