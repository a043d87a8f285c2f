//! Beat and downbeat grids for a known tempo
//!
//! The grid starts at t = 0 and assumes a constant tempo in 4/4.

use crate::confidence::Confidence;
use crate::tempo::TempoEstimate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Beats per bar
pub const BEATS_PER_BAR: u32 = 4;

/// Confidence attached to a grid built from a caller-supplied tempo
const DEFAULT_BEAT_CONFIDENCE: f32 = 0.8;

/// Beat grid of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatInfo {
    /// BPM the grid was built from
    pub tempo: f32,
    /// Beat times in seconds, ascending
    pub beat_times: Vec<f64>,
    /// Times of every fourth beat, starting with the first
    pub downbeat_times: Vec<f64>,
    pub beat_confidence: Confidence,
    /// Always 4
    pub time_signature: u32,
}

impl BeatInfo {
    /// Seconds per beat, or 0 for a degenerate tempo
    pub fn beat_period(&self) -> f64 {
        if self.tempo > 0.0 {
            60.0 / self.tempo as f64
        } else {
            0.0
        }
    }

    /// Get the beat number (can be fractional) at a given time
    pub fn beat_at(&self, time: f64) -> f64 {
        let period = self.beat_period();
        if period > 0.0 {
            time / period
        } else {
            0.0
        }
    }

    /// Get the phase (0.0 - 1.0) within the current beat at a given time
    pub fn phase_at(&self, time: f64) -> f32 {
        self.beat_at(time).rem_euclid(1.0) as f32
    }

    /// Time of the grid beat closest to `time`, if the grid has any beats
    pub fn nearest_beat(&self, time: f64) -> Option<f64> {
        let idx = self.beat_times.partition_point(|&t| t < time);
        let after = self.beat_times.get(idx).copied();
        let before = idx.checked_sub(1).and_then(|i| self.beat_times.get(i)).copied();
        match (before, after) {
            (Some(b), Some(a)) => Some(if time - b <= a - time { b } else { a }),
            (Some(b), None) => Some(b),
            (None, a) => a,
        }
    }
}

/// Builds constant-tempo beat grids
#[derive(Debug, Clone)]
pub struct BeatTracker {
    confidence: Confidence,
}

impl Default for BeatTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatTracker {
    /// Tracker whose grids carry a heuristic confidence of 0.8
    pub fn new() -> Self {
        Self {
            confidence: Confidence::heuristic(DEFAULT_BEAT_CONFIDENCE),
        }
    }

    /// Place beats at `i * 60 / bpm` for every time below `duration_secs`
    ///
    /// A non-positive (or non-finite) tempo or duration gives an empty grid.
    pub fn track(&self, bpm: f32, duration_secs: f64) -> BeatInfo {
        build_grid(bpm, duration_secs, self.confidence)
    }

    /// Grid from a tempo estimate, carrying its computed confidence
    pub fn track_from_estimate(&self, estimate: &TempoEstimate, duration_secs: f64) -> BeatInfo {
        build_grid(estimate.bpm, duration_secs, estimate.confidence)
    }
}

fn build_grid(bpm: f32, duration_secs: f64, confidence: Confidence) -> BeatInfo {
    let mut beat_times = Vec::new();
    let mut downbeat_times = Vec::new();

    if bpm > 0.0 && bpm.is_finite() && duration_secs > 0.0 && duration_secs.is_finite() {
        let period = 60.0 / bpm as f64;
        let mut i: u64 = 0;
        loop {
            // Multiply rather than accumulate so late beats do not drift
            let time = i as f64 * period;
            if time >= duration_secs {
                break;
            }
            beat_times.push(time);
            if i % BEATS_PER_BAR as u64 == 0 {
                downbeat_times.push(time);
            }
            i += 1;
        }
    }

    debug!(bpm, beats = beat_times.len(), "beat grid built");

    BeatInfo {
        tempo: bpm,
        beat_times,
        downbeat_times,
        beat_confidence: confidence,
        time_signature: BEATS_PER_BAR,
    }
}
