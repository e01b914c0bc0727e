//! Narration script parsing.
//!
//! The describer model emits a plain-text script: description lines of
//! the form `[M:SS.mmm] text` and silent-period lines of the form
//! `[a] - [b]`. Anything else (headers, chatter) is ignored. Parsed
//! times are clamped to the source duration since the model routinely
//! overshoots the final seconds.

use regex::Regex;
use tracing::{debug, warn};

use vscribe_media::describe::SilenceInterval;
use vscribe_models::{clamp_to_duration, parse_timestamp, DescriptionCue};

use crate::error::{WorkerError, WorkerResult};

/// Duration of the sentinel silence window inserted at the head of the
/// timeline when the model reports no silence at the very start.
const SENTINEL_WINDOW_SECS: f64 = 0.1;

/// A parsed narration script: description cues plus the silent periods
/// of the source soundtrack.
#[derive(Debug, Clone)]
pub struct NarrationScript {
    pub cues: Vec<DescriptionCue>,
    pub silences: Vec<SilenceInterval>,
}

/// Parse a model-emitted script against a known source duration.
///
/// Returns an error when no description line parses at all; individual
/// malformed lines are skipped with a warning.
pub fn parse_script(text: &str, source_duration: f64) -> WorkerResult<NarrationScript> {
    if source_duration <= 0.0 {
        return Err(WorkerError::script_parse(format!(
            "Source duration must be positive, got {}",
            source_duration
        )));
    }

    let silence_re = Regex::new(r"^\s*\[([0-9:.]+)\]\s*-\s*\[([0-9:.]+)\]\s*$").unwrap();
    let cue_re = Regex::new(r"^\s*\[([0-9:.]+)\]\s*(\S.*?)\s*$").unwrap();

    let mut cues = Vec::new();
    let mut silences = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = silence_re.captures(line) {
            match (parse_timestamp(&caps[1]), parse_timestamp(&caps[2])) {
                (Ok(start), Ok(end)) => {
                    let start = clamp_to_duration(start, source_duration);
                    let end = clamp_to_duration(end, source_duration);
                    if end > start {
                        silences.push((start, end));
                    } else {
                        debug!(line, "Silent period collapsed by clamping, skipping");
                    }
                }
                _ => warn!(line, "Unparseable silent-period line, skipping"),
            }
            continue;
        }

        if let Some(caps) = cue_re.captures(line) {
            match parse_timestamp(&caps[1]) {
                Ok(secs) => {
                    let secs = clamp_to_duration(secs, source_duration);
                    cues.push(DescriptionCue::new(secs, &caps[2]));
                }
                Err(e) => warn!(line, error = %e, "Unparseable description line, skipping"),
            }
        }
    }

    if cues.is_empty() {
        return Err(WorkerError::script_parse(
            "Script contains no description lines",
        ));
    }
    cues.sort_by(|a, b| a.source_timestamp_secs.total_cmp(&b.source_timestamp_secs));

    let silences = normalize_silences(silences);

    debug!(
        cues = cues.len(),
        silences = silences.len(),
        "Parsed narration script"
    );
    Ok(NarrationScript { cues, silences })
}

/// Sort, seed with the leading sentinel, and merge overlapping periods.
///
/// The allocator needs a window at time zero to anchor cues stamped at
/// the very start, so a `(0, 0.1)` sentinel is inserted whenever the
/// reported silence does not begin at 0.
fn normalize_silences(mut raw: Vec<(f64, f64)>) -> Vec<SilenceInterval> {
    raw.sort_by(|a, b| a.0.total_cmp(&b.0));

    if raw.first().map(|w| w.0 > 0.0).unwrap_or(true) {
        raw.insert(0, (0.0, SENTINEL_WINDOW_SECS));
    }

    // Clamping can push neighboring periods into each other
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(raw.len());
    for (start, end) in raw {
        match merged.last_mut() {
            Some(prev) if start < prev.1 => prev.1 = prev.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    merged
        .into_iter()
        .filter_map(|(start, end)| SilenceInterval::new(start, end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_script() {
        let text = "\
Description:
[0:02] A man walks into frame.
[0:14.500] The camera pans to the window.

Silent periods:
[0:00] - [0:03.2]
[0:09] - [0:15]
";
        let script = parse_script(text, 60.0).unwrap();
        assert_eq!(script.cues.len(), 2);
        assert_eq!(script.cues[0].source_timestamp_secs, 2.0);
        assert_eq!(script.cues[1].source_timestamp_secs, 14.5);
        assert_eq!(script.cues[1].text, "The camera pans to the window.");
        assert_eq!(script.silences.len(), 2);
        assert_eq!(script.silences[0].start_secs, 0.0);
        assert!((script.silences[0].end_secs - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_sentinel_inserted_when_no_silence_at_zero() {
        let text = "[0:05] A description.\n[0:10] - [0:12]\n";
        let script = parse_script(text, 60.0).unwrap();
        assert_eq!(script.silences[0].start_secs, 0.0);
        assert!((script.silences[0].end_secs - 0.1).abs() < 1e-9);
        assert_eq!(script.silences.len(), 2);
    }

    #[test]
    fn test_sentinel_inserted_when_no_silence_at_all() {
        let script = parse_script("[0:05] Only a cue.\n", 60.0).unwrap();
        assert_eq!(script.silences.len(), 1);
        assert_eq!(script.silences[0].start_secs, 0.0);
    }

    #[test]
    fn test_cue_past_end_is_clamped() {
        let script = parse_script("[2:30] Late description.\n", 60.0).unwrap();
        assert!((script.cues[0].source_timestamp_secs - 59.9).abs() < 1e-9);
    }

    #[test]
    fn test_silence_past_end_is_clamped() {
        let script = parse_script("[0:01] Cue.\n[0:50] - [2:00]\n", 60.0).unwrap();
        let last = script.silences.last().unwrap();
        assert_eq!(last.start_secs, 50.0);
        assert!((last.end_secs - 59.9).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_silences_merged() {
        let text = "[0:01] Cue.\n[0:00] - [0:10]\n[0:08] - [0:12]\n";
        let script = parse_script(text, 60.0).unwrap();
        assert_eq!(script.silences.len(), 1);
        assert_eq!(script.silences[0].end_secs, 12.0);
    }

    #[test]
    fn test_cues_sorted_by_timestamp() {
        let text = "[0:30] Second.\n[0:05] First.\n";
        let script = parse_script(text, 60.0).unwrap();
        assert_eq!(script.cues[0].text, "First.");
        assert_eq!(script.cues[1].text, "Second.");
    }

    #[test]
    fn test_no_cues_is_an_error() {
        let result = parse_script("nothing useful here\n", 60.0);
        assert!(matches!(result, Err(WorkerError::ScriptParse(_))));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "[0:02] Good cue.\n[bad] broken line\n";
        let script = parse_script(text, 60.0).unwrap();
        assert_eq!(script.cues.len(), 1);
    }
}
