//! Silence interval arithmetic and the allocator's window pool.
//!
//! A `SilenceInterval` is a speech-free stretch of the source timeline.
//! The allocator owns a `SilencePool` of them for one pass: sorted,
//! non-overlapping, shrunk as cues consume silent footage. Adjacent
//! touching intervals are legal and are never merged.

use serde::{Deserialize, Serialize};

use crate::error::{DescribeError, DescribeResult};

/// A speech-free interval on the source timeline, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceInterval {
    /// Start of the interval in seconds
    pub start_secs: f64,
    /// End of the interval in seconds (exclusive)
    pub end_secs: f64,
}

impl SilenceInterval {
    /// Create an interval. Returns `None` for degenerate spans.
    pub fn new(start_secs: f64, end_secs: f64) -> Option<Self> {
        if start_secs.is_finite() && end_secs.is_finite() && start_secs < end_secs {
            Some(Self {
                start_secs,
                end_secs,
            })
        } else {
            None
        }
    }

    /// Duration of the interval in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Whether `point` falls inside this interval (inclusive bounds;
    /// a cue exactly at the window end still counts as covered).
    pub fn contains(&self, point: f64) -> bool {
        self.start_secs <= point && point <= self.end_secs
    }

    /// Whether two intervals overlap. Touching endpoints do not count.
    pub fn overlaps(&self, other: &SilenceInterval) -> bool {
        self.start_secs < other.end_secs && other.start_secs < self.end_secs
    }

    /// Split the interval at `at`, returning the non-degenerate pieces
    /// before and after the split point.
    pub fn split(&self, at: f64) -> (Option<SilenceInterval>, Option<SilenceInterval>) {
        (
            SilenceInterval::new(self.start_secs, at.min(self.end_secs)),
            SilenceInterval::new(at.max(self.start_secs), self.end_secs),
        )
    }
}

/// Mutable pool of silence windows, owned by the allocator for the
/// lifetime of one allocation pass.
#[derive(Debug, Clone)]
pub struct SilencePool {
    windows: Vec<SilenceInterval>,
}

impl SilencePool {
    /// Build a pool from collaborator output.
    ///
    /// Degenerate spans are dropped, the rest sorted by start time.
    /// Overlapping windows are rejected: the upstream detector emits
    /// disjoint intervals, so an overlap means garbage input.
    pub fn new(intervals: Vec<SilenceInterval>) -> DescribeResult<Self> {
        let mut windows: Vec<SilenceInterval> = intervals
            .into_iter()
            .filter(|w| w.start_secs < w.end_secs)
            .collect();
        windows.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        for pair in windows.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                return Err(DescribeError::invalid_input(format!(
                    "Overlapping silence intervals: [{:.3}, {:.3}) and [{:.3}, {:.3})",
                    pair[0].start_secs, pair[0].end_secs, pair[1].start_secs, pair[1].end_secs
                )));
            }
        }

        Ok(Self { windows })
    }

    /// Remaining windows, sorted by start time.
    pub fn windows(&self) -> &[SilenceInterval] {
        &self.windows
    }

    /// Whether the pool has no windows left.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Find the window containing `point`, if any.
    pub fn find_containing(&self, point: f64) -> Option<SilenceInterval> {
        self.windows.iter().find(|w| w.contains(point)).copied()
    }

    /// Nearest window starting at or after `point`, within `tolerance`.
    pub fn nearest_forward(&self, point: f64, tolerance_secs: f64) -> Option<SilenceInterval> {
        self.windows
            .iter()
            .find(|w| w.start_secs >= point && w.start_secs - point < tolerance_secs)
            .copied()
    }

    /// Nearest window ending at or before `point`, within `tolerance`.
    pub fn nearest_backward(&self, point: f64, tolerance_secs: f64) -> Option<SilenceInterval> {
        self.windows
            .iter()
            .rev()
            .find(|w| w.end_secs <= point && point - w.end_secs < tolerance_secs)
            .copied()
    }

    /// Remove the coverage `[start, end)` from every window it touches,
    /// splitting windows that surround it. Degenerate leftovers are
    /// dropped; ordering and disjointness are preserved by construction.
    pub fn consume(&mut self, start: f64, end: f64) {
        let mut rebuilt = Vec::with_capacity(self.windows.len() + 1);
        for w in &self.windows {
            if end <= w.start_secs || w.end_secs <= start {
                rebuilt.push(*w);
                continue;
            }
            if let Some(before) = SilenceInterval::new(w.start_secs, start) {
                rebuilt.push(before);
            }
            if let Some(after) = SilenceInterval::new(end, w.end_secs) {
                rebuilt.push(after);
            }
        }
        self.windows = rebuilt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(s: f64, e: f64) -> SilenceInterval {
        SilenceInterval::new(s, e).unwrap()
    }

    #[test]
    fn test_interval_new_rejects_degenerate() {
        assert!(SilenceInterval::new(5.0, 5.0).is_none());
        assert!(SilenceInterval::new(6.0, 5.0).is_none());
        assert!(SilenceInterval::new(f64::NAN, 5.0).is_none());
    }

    #[test]
    fn test_contains_inclusive_bounds() {
        let w = iv(10.0, 20.0);
        assert!(w.contains(10.0));
        assert!(w.contains(20.0));
        assert!(w.contains(12.0));
        assert!(!w.contains(20.001));
    }

    #[test]
    fn test_overlaps_touching_is_not_overlap() {
        assert!(iv(0.0, 5.0).overlaps(&iv(4.0, 6.0)));
        assert!(!iv(0.0, 5.0).overlaps(&iv(5.0, 6.0)));
        assert!(!iv(0.0, 5.0).overlaps(&iv(7.0, 9.0)));
    }

    #[test]
    fn test_split() {
        let w = iv(10.0, 20.0);
        let (before, after) = w.split(15.0);
        assert_eq!(before.unwrap(), iv(10.0, 15.0));
        assert_eq!(after.unwrap(), iv(15.0, 20.0));

        // Split at a boundary leaves one side empty
        let (before, after) = w.split(10.0);
        assert!(before.is_none());
        assert_eq!(after.unwrap(), w);

        // Split outside the window leaves it whole on one side
        let (before, after) = w.split(25.0);
        assert_eq!(before.unwrap(), w);
        assert!(after.is_none());
    }

    #[test]
    fn test_pool_sorts_and_drops_degenerate() {
        let pool = SilencePool::new(vec![iv(9.0, 15.0), iv(0.0, 3.0)]).unwrap();
        assert_eq!(pool.windows(), &[iv(0.0, 3.0), iv(9.0, 15.0)]);
    }

    #[test]
    fn test_pool_rejects_overlap() {
        let result = SilencePool::new(vec![iv(0.0, 5.0), iv(4.0, 8.0)]);
        assert!(matches!(result, Err(DescribeError::InvalidInput(_))));
    }

    #[test]
    fn test_pool_allows_touching() {
        let pool = SilencePool::new(vec![iv(0.0, 5.0), iv(5.0, 8.0)]).unwrap();
        assert_eq!(pool.windows().len(), 2);
    }

    #[test]
    fn test_find_containing() {
        let pool = SilencePool::new(vec![iv(0.0, 3.0), iv(9.0, 15.0)]).unwrap();
        assert_eq!(pool.find_containing(10.0), Some(iv(9.0, 15.0)));
        assert_eq!(pool.find_containing(5.0), None);
    }

    #[test]
    fn test_nearest_forward() {
        let pool = SilencePool::new(vec![iv(25.0, 26.5), iv(40.0, 45.0)]).unwrap();
        assert_eq!(pool.nearest_forward(23.0, 5.0), Some(iv(25.0, 26.5)));
        assert_eq!(pool.nearest_forward(35.0, 5.0), None);
        assert_eq!(pool.nearest_forward(36.0, 5.0), Some(iv(40.0, 45.0)));
    }

    #[test]
    fn test_nearest_backward() {
        let pool = SilencePool::new(vec![iv(10.0, 12.0), iv(20.0, 22.0)]).unwrap();
        assert_eq!(pool.nearest_backward(24.0, 5.0), Some(iv(20.0, 22.0)));
        assert_eq!(pool.nearest_backward(28.0, 5.0), None);
        assert_eq!(pool.nearest_backward(15.0, 5.0), Some(iv(10.0, 12.0)));
    }

    #[test]
    fn test_consume_splits_surrounding_window() {
        let mut pool = SilencePool::new(vec![iv(10.0, 20.0)]).unwrap();
        pool.consume(12.0, 15.0);
        assert_eq!(pool.windows(), &[iv(10.0, 12.0), iv(15.0, 20.0)]);
    }

    #[test]
    fn test_consume_collapses_window() {
        let mut pool = SilencePool::new(vec![iv(10.0, 20.0)]).unwrap();
        pool.consume(10.0, 20.0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_consume_upper_bound() {
        let mut pool = SilencePool::new(vec![iv(10.0, 20.0)]).unwrap();
        pool.consume(18.0, 20.0);
        assert_eq!(pool.windows(), &[iv(10.0, 18.0)]);
    }

    #[test]
    fn test_consume_ignores_disjoint_windows() {
        let mut pool = SilencePool::new(vec![iv(0.0, 3.0), iv(9.0, 15.0)]).unwrap();
        pool.consume(4.0, 8.0);
        assert_eq!(pool.windows().len(), 2);
    }
}
