//! Described-video recomposition: silence-aware narration placement.
//!
//! The engine takes a source video, a set of narration cues resolved to
//! synthesized audio clips, and the silence windows of the source
//! soundtrack, and decides where each narration plays:
//!
//! 1. [`allocator`] consumes silence windows from a [`SilencePool`],
//!    placing each cue as an in-silence overlay where one fits and
//!    falling back to freezing the frame where none does.
//! 2. [`timeline`] turns the placement decisions into a gap-free list
//!    of [`Segment`]s covering the whole source.
//! 3. [`mixer`] matches narration loudness to the surrounding source
//!    audio and builds the per-segment mix graphs.
//!
//! Rendering the segments into an output file lives with the caller;
//! everything here is deterministic given the cues and the pool.

pub mod allocator;
pub mod config;
pub mod interval;
pub mod mixer;
pub mod timeline;

pub use allocator::{Allocation, CueAllocator, PlacementDecision, PlacementWarning};
pub use config::{AllocationStrategy, DescribeConfig};
pub use interval::{SilenceInterval, SilencePool};
pub use mixer::{MusicBed, SegmentMixer};
pub use timeline::{
    build_timeline, total_output_secs, verify_timeline, NarrationTrack, Segment,
};
