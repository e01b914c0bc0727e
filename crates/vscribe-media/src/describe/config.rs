//! Configuration for description placement and mixing.
//!
//! These parameters control how cues are matched to silence windows and
//! how the narration is blended into the original track. The defaults
//! reproduce the tuned production values.

use serde::{Deserialize, Serialize};

/// Placement strategy for description cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Match cues against detected silence windows; freeze only when a
    /// window is too short or none is near enough.
    SilenceAware,
    /// Freeze at every cue timestamp and narrate over the still frame.
    /// Used when no silence data is available.
    AlwaysFreeze,
}

/// Configuration for the description engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeConfig {
    /// Placement strategy.
    pub strategy: AllocationStrategy,

    /// Tolerance for the near-window tie-break search (seconds).
    ///
    /// Cue timestamps and silence windows come from independently
    /// generated streams and rarely align exactly; a window starting
    /// shortly after the cue, or ending shortly before it, within this
    /// tolerance is still used.
    /// - Default: 5.0
    pub tolerance_secs: f64,

    /// Offset past the committed end for fallback placements (seconds).
    ///
    /// When no window is found within tolerance the cue is frozen at
    /// `last_end + fallback_offset_secs`. This guarantees forward
    /// progress even with zero silence data.
    /// - Default: 0.5
    pub fallback_offset_secs: f64,

    /// Fade length applied to the original track at segment edges
    /// (seconds). The original fades out into the insertion point and
    /// back in from the segment end so the cut is not audibly abrupt.
    /// - Default: 0.2
    pub edge_fade_secs: f64,

    /// Fade length for the background music bed (seconds).
    /// - Default: 0.5
    pub music_fade_secs: f64,

    /// Music bed level relative to the original peak.
    /// - Default: 0.5
    pub music_level: f64,

    /// Further perceptual attenuation applied to the music bed so it
    /// sits well below the narration.
    /// - Default: 0.12
    pub music_ducking: f64,

    /// Half-width of the window around the insertion point used to
    /// measure the original track's peak volume (seconds).
    /// - Default: 5.0
    pub peak_window_secs: f64,
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            strategy: AllocationStrategy::SilenceAware,
            tolerance_secs: 5.0,
            fallback_offset_secs: 0.5,
            edge_fade_secs: 0.2,
            music_fade_secs: 0.5,
            music_level: 0.5,
            music_ducking: 0.12,
            peak_window_secs: 5.0,
        }
    }
}

impl DescribeConfig {
    /// Configuration that freezes at every cue (no silence data).
    pub fn always_freeze() -> Self {
        Self {
            strategy: AllocationStrategy::AlwaysFreeze,
            ..Default::default()
        }
    }

    /// Builder-style setter for the placement strategy.
    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder-style setter for the tie-break tolerance.
    pub fn with_tolerance_secs(mut self, secs: f64) -> Self {
        self.tolerance_secs = secs.max(0.0);
        self
    }

    /// Builder-style setter for the fallback offset.
    pub fn with_fallback_offset_secs(mut self, secs: f64) -> Self {
        self.fallback_offset_secs = secs.max(0.0);
        self
    }

    /// Builder-style setter for the edge fade length.
    pub fn with_edge_fade_secs(mut self, secs: f64) -> Self {
        self.edge_fade_secs = secs.max(0.0);
        self
    }
}
