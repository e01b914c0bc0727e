//! Cue allocator: decides, per cue, where its narration plays.
//!
//! Cues are processed in timestamp order against a mutable pool of
//! silence windows. Each decision either rides an existing silent
//! stretch of real video, plays real video up to a window's end and
//! freezes for the overflow, or falls back to an immediate freeze just
//! past the committed end. Decisions are strictly order-dependent: cue
//! `i+1` sees the pool as cue `i` left it, so allocation is a single
//! sequential pass.

use tracing::{debug, warn};

use vscribe_models::{validate_cue_order, CueId, ResolvedCue};

use super::config::{AllocationStrategy, DescribeConfig};
use super::interval::SilencePool;
use crate::error::DescribeResult;

/// Where one cue's narration is realized on the source timeline.
#[derive(Debug, Clone)]
pub struct PlacementDecision {
    /// The cue being placed
    pub cue: ResolvedCue,
    /// Source-timeline point where the segment boundary begins
    pub insertion_time: f64,
    /// Source-timeline point where a still frame is held, if any.
    ///
    /// - `None`: narration rides over real, moving video.
    /// - `== insertion_time`: freeze immediately; the full narration
    ///   plays over the still frame.
    /// - `> insertion_time`: real video plays up to this point, then
    ///   the frame freezes for the narration overflow.
    pub freeze_time: Option<f64>,
}

impl PlacementDecision {
    /// The output-committed end of this decision on the source timeline.
    pub fn committed_end(&self) -> f64 {
        match self.freeze_time {
            Some(freeze) => freeze,
            None => self.insertion_time + self.cue.audio_duration_secs,
        }
    }

    /// Seconds of new output time this decision inserts (freeze only).
    pub fn inserted_secs(&self) -> f64 {
        match self.freeze_time {
            Some(freeze) => self.cue.audio_duration_secs - (freeze - self.insertion_time),
            None => 0.0,
        }
    }
}

/// Warning emitted for a degraded (fallback) placement.
#[derive(Debug, Clone)]
pub struct PlacementWarning {
    /// Cue that could not be matched to a silence window
    pub cue_id: CueId,
    /// The cue's requested source timestamp
    pub requested_secs: f64,
    /// Where it was actually placed
    pub placed_secs: f64,
}

impl std::fmt::Display for PlacementWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no silence window near cue {} at {:.3}s, frozen at {:.3}s",
            self.cue_id, self.requested_secs, self.placed_secs
        )
    }
}

/// Result of one allocation pass.
#[derive(Debug)]
pub struct Allocation {
    /// Placement decisions, in cue order
    pub decisions: Vec<PlacementDecision>,
    /// Degraded placements (non-fatal)
    pub warnings: Vec<PlacementWarning>,
    /// Whatever silence the cues did not consume. Discarded by the
    /// pipeline; kept so consumption can be inspected.
    pub remaining_pool: SilencePool,
}

/// Single-pass allocator owning the silence pool.
pub struct CueAllocator {
    pool: SilencePool,
    config: DescribeConfig,
    last_end: f64,
}

impl CueAllocator {
    /// Create an allocator over a silence pool.
    pub fn new(pool: SilencePool, config: DescribeConfig) -> Self {
        Self {
            pool,
            config,
            last_end: 0.0,
        }
    }

    /// Allocate every cue, consuming the allocator and its pool.
    ///
    /// Cues must already be sorted by source timestamp; unsortable or
    /// malformed cues abort before any placement.
    pub fn allocate(mut self, cues: Vec<ResolvedCue>) -> DescribeResult<Allocation> {
        validate_cue_order(&cues)?;

        let mut decisions = Vec::with_capacity(cues.len());
        let mut warnings = Vec::new();

        for cue in cues {
            let (insertion_time, freeze_time, degraded) = match self.config.strategy {
                AllocationStrategy::SilenceAware => self.place_silence_aware(&cue),
                AllocationStrategy::AlwaysFreeze => self.place_always_freeze(&cue),
            };

            if degraded {
                let warning = PlacementWarning {
                    cue_id: cue.id,
                    requested_secs: cue.source_timestamp_secs,
                    placed_secs: insertion_time,
                };
                warn!(
                    cue_id = %warning.cue_id,
                    requested_secs = warning.requested_secs,
                    placed_secs = warning.placed_secs,
                    "Degraded placement: no silence window within tolerance"
                );
                warnings.push(warning);
            } else {
                debug!(
                    cue_id = %cue.id,
                    insertion_time,
                    ?freeze_time,
                    "Placed description cue"
                );
            }

            let decision = PlacementDecision {
                cue,
                insertion_time,
                freeze_time,
            };
            self.last_end = self.last_end.max(decision.committed_end());
            decisions.push(decision);
        }

        Ok(Allocation {
            decisions,
            warnings,
            remaining_pool: self.pool,
        })
    }

    /// Silence-aware placement: containment, then the near-window
    /// tie-break, then the fallback freeze.
    fn place_silence_aware(&mut self, cue: &ResolvedCue) -> (f64, Option<f64>, bool) {
        let t = cue.source_timestamp_secs;
        let dur = cue.audio_duration_secs;

        // Exact containment. A window starting before the committed end
        // cannot be used without rewinding the output, so it falls
        // through to the tie-break.
        if t >= self.last_end {
            if let Some(w) = self.pool.find_containing(t) {
                if t + dur <= w.end_secs {
                    self.pool.consume(t, t + dur);
                    return (t, None, false);
                }
                self.pool.consume(t, w.end_secs);
                return (t, Some(w.end_secs), false);
            }
        }

        // Near-window tie-break: a window starting shortly after the
        // cue, or ending shortly before it. Candidates must start past
        // the committed end (no time travel, and no zero-length reuse
        // of a window whose tail was just consumed); earliest such
        // window wins.
        let tolerance = self.config.tolerance_secs;
        let candidate = [
            self.pool.nearest_backward(t, tolerance),
            self.pool.nearest_forward(t, tolerance),
        ]
        .into_iter()
        .flatten()
        .filter(|w| w.start_secs > self.last_end)
        .min_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        if let Some(w) = candidate {
            let insertion = w.start_secs;
            if w.duration_secs() <= dur {
                // Window too short for the whole narration
                self.pool.consume(w.start_secs, w.end_secs);
                return (insertion, Some(w.end_secs), false);
            }
            self.pool.consume(insertion, insertion + dur);
            return (insertion, None, false);
        }

        // Fallback: freeze a little after the last committed point.
        let placed = self.last_end + self.config.fallback_offset_secs;
        (placed, Some(placed), true)
    }

    /// Always-freeze placement: still frame at the cue timestamp,
    /// clamped forward so the cursor never rewinds.
    fn place_always_freeze(&mut self, cue: &ResolvedCue) -> (f64, Option<f64>, bool) {
        let t = cue.source_timestamp_secs.max(self.last_end);
        (t, Some(t), false)
    }
}
