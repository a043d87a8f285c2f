//! Intro, outro and mix points derived from the energy envelope

use crate::beat::BeatInfo;
use crate::confidence::Confidence;
use crate::energy::ENERGY_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Share of the track searched for the intro, and its upper bound in seconds
const INTRO_SHARE: f64 = 0.15;
const INTRO_MAX_SECS: f64 = 60.0;

/// Share of the envelope frames searched for the outro
const OUTRO_SHARE: f64 = 0.2;

/// Envelope level treated as silence
const SILENCE_THRESHOLD: f32 = 0.001;

/// A frame this far above the intro average marks the first loud entry
const ENTRY_RATIO: f32 = 1.5;
/// Outro frames below this share of the outro average count as faded out
const FADE_RATIO: f32 = 0.3;

/// Earliest start point after leading silence, and without it (seconds)
const MIN_START_AFTER_SILENCE: f64 = 0.5;
const MIN_START: f64 = 2.0;
/// End point used when the track never fades out, in seconds before the end
const HARD_ENDING_MARGIN: f64 = 8.0;

/// Distance from the intro start to the mix-in point, and from the mix-out
/// point to the outro end (seconds)
const MIX_IN_OFFSET: f64 = 2.0;
const MIX_OUT_OFFSET: f64 = 4.0;

/// Where a track becomes worth playing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntroInfo {
    /// Seconds
    pub best_start_point: f64,
    pub confidence: Confidence,
    /// The track opens with silence
    pub has_silence: bool,
    /// Per-frame rise from the first to the last quarter of the intro
    pub energy_buildup: f32,
}

/// Where a track stops being worth playing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutroInfo {
    /// Seconds
    pub best_end_point: f64,
    pub confidence: Confidence,
    /// Per-frame fall from the first to the last quarter of the outro
    pub energy_decay: f32,
}

/// Mixing layout of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStructure {
    pub intro: IntroInfo,
    pub outro: OutroInfo,
    /// Seconds, on the beat grid when one is available
    pub mix_in_point: f64,
    /// Seconds, on the beat grid when one is available
    pub mix_out_point: f64,
}

impl TrackStructure {
    /// Derive the layout from a frame envelope (mean |x| per
    /// [`ENERGY_FRAME_SIZE`] samples) and the beat grid of the track
    pub fn from_envelope(
        envelope: &[f32],
        sample_rate: u32,
        duration_secs: f64,
        beats: &BeatInfo,
    ) -> Self {
        let frame_secs = ENERGY_FRAME_SIZE as f64 / sample_rate.max(1) as f64;
        let duration = duration_secs.max(0.0);

        let intro = intro(envelope, frame_secs, duration);
        let outro = outro(envelope, frame_secs, duration);

        let mix_in = (intro.best_start_point + MIX_IN_OFFSET).min(duration);
        let mix_out = (outro.best_end_point - MIX_OUT_OFFSET).max(0.0);
        let snap = |t: f64| beats.nearest_beat(t).unwrap_or(t);

        let structure = Self {
            mix_in_point: snap(mix_in),
            mix_out_point: snap(mix_out),
            intro,
            outro,
        };
        debug!(
            mix_in = structure.mix_in_point,
            mix_out = structure.mix_out_point,
            "track structure derived"
        );
        structure
    }
}

fn intro(envelope: &[f32], frame_secs: f64, duration: f64) -> IntroInfo {
    let intro_secs = (duration * INTRO_SHARE).min(INTRO_MAX_SECS);
    let frames = ((intro_secs / frame_secs) as usize).min(envelope.len());
    let window = &envelope[..frames];

    let has_silence = envelope.first().is_some_and(|&e| e < SILENCE_THRESHOLD);

    let (start, confidence) = if has_silence {
        let entry = envelope
            .iter()
            .position(|&e| e >= SILENCE_THRESHOLD)
            .map_or(duration, |i| i as f64 * frame_secs);
        (entry.max(MIN_START_AFTER_SILENCE), 0.8)
    } else {
        let average = mean(window);
        let entry = window
            .iter()
            .position(|&e| e > average * ENTRY_RATIO)
            .unwrap_or(0);
        ((entry as f64 * frame_secs).max(MIN_START), 0.6)
    };

    IntroInfo {
        best_start_point: start.min(duration),
        confidence: Confidence::heuristic(confidence),
        has_silence,
        energy_buildup: quarter_trend(window),
    }
}

fn outro(envelope: &[f32], frame_secs: f64, duration: f64) -> OutroInfo {
    let tail_start = ((envelope.len() as f64) * (1.0 - OUTRO_SHARE)) as usize;
    let tail = &envelope[tail_start.min(envelope.len())..];
    let threshold = mean(tail) * FADE_RATIO;

    let (end, confidence) = match tail.iter().rposition(|&e| e > threshold) {
        // Still loud on the last frame: the track ends hard
        Some(last) if last + 1 == tail.len() => (duration - HARD_ENDING_MARGIN, 0.5),
        Some(last) => ((tail_start + last + 1) as f64 * frame_secs, 0.7),
        None => (tail_start as f64 * frame_secs, 0.7),
    };

    OutroInfo {
        best_end_point: end.clamp(0.0, duration),
        confidence: Confidence::heuristic(confidence),
        energy_decay: -quarter_trend(tail),
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Last-quarter average minus first-quarter average, per frame
fn quarter_trend(values: &[f32]) -> f32 {
    let quarter = values.len() / 4;
    if quarter == 0 {
        return 0.0;
    }
    let first = mean(&values[..quarter]);
    let last = mean(&values[values.len() - quarter..]);
    (last - first) / values.len() as f32
}
