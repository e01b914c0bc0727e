#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for described-video recomposition.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation and timeout
//! - Media probing via ffprobe
//! - Silence-aware narration placement (interval pool, allocator,
//!   timeline, audio mixer) under [`describe`]

pub mod command;
pub mod describe;
pub mod error;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use describe::{
    build_timeline, total_output_secs, verify_timeline, Allocation, AllocationStrategy,
    CueAllocator, DescribeConfig, NarrationTrack, PlacementDecision, PlacementWarning, Segment,
    SegmentMixer, SilenceInterval, SilencePool,
};
pub use error::{DescribeError, DescribeResult};
pub use probe::{get_duration, probe_media, probe_source_video, MediaInfo};
