//! Pairing two analyzed tracks for a mix

use crate::analyzer::AudioFeatures;
use crate::camelot::CamelotKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Crossfade length in beats when the outgoing tempo is known
const CROSSFADE_BEATS: f64 = 16.0;
/// Crossfade length when it is not (seconds)
const FALLBACK_CROSSFADE_SECS: f64 = 24.0;

/// Tempo gaps (BPM) at or below which a beat-matched blend works, and above
/// which the tempo has to be ridden
const BEAT_MATCH_BPM: f32 = 5.0;
const TEMPO_CHANGE_BPM: f32 = 10.0;

/// Energy match needed for a harmonic mix, and for an energy mix
const HARMONIC_ENERGY_MATCH: f32 = 0.7;
const ENERGY_MIX_MATCH: f32 = 0.8;

const HARMONIC_WEIGHT: f32 = 0.4;
const ENERGY_WEIGHT: f32 = 0.3;
const TEMPO_WEIGHT: f32 = 0.3;

/// How the outgoing track should hand over to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    HarmonicMix,
    TempoChange,
    EnergyMix,
    BeatMatched,
    StandardCrossfade,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionKind::HarmonicMix => "Harmonic Mix",
            TransitionKind::TempoChange => "Tempo Change",
            TransitionKind::EnergyMix => "Energy Mix",
            TransitionKind::BeatMatched => "Beat Matched",
            TransitionKind::StandardCrossfade => "Standard Crossfade",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSuggestion {
    pub kind: TransitionKind,
    /// Weighted blend of the key, energy and tempo matches, 0..=1
    pub score: f32,
    /// Both keys are known and compatible on the wheel
    pub harmonic: bool,
    /// `None` when either key is unknown
    pub wheel_distance: Option<u8>,
    /// Smallest gap after allowing half and double time, `None` when either
    /// tempo is unknown
    pub bpm_diff: Option<f32>,
    /// Ratio of the quieter RMS to the louder, 0..=1
    pub energy_match: f32,
    /// Seconds into the outgoing track
    pub mix_out_point: f64,
    /// Seconds into the incoming track
    pub mix_in_point: f64,
    pub crossfade_secs: f64,
}

/// Suggest how to mix from `current` into `next`
pub fn suggest_transition(current: &AudioFeatures, next: &AudioFeatures) -> TransitionSuggestion {
    let keys = CamelotKey::parse(&current.camelot_key).zip(CamelotKey::parse(&next.camelot_key));
    let wheel_distance = keys.map(|(a, b)| a.wheel_distance(&b));
    let harmonic = keys.is_some_and(|(a, b)| a.is_compatible(&b));

    let bpm_diff = tempo_gap(current.bpm, next.bpm);
    let energy_match = energy_match(current.rms_energy, next.rms_energy);

    let kind = if harmonic && energy_match > HARMONIC_ENERGY_MATCH {
        TransitionKind::HarmonicMix
    } else if bpm_diff.is_some_and(|d| d > TEMPO_CHANGE_BPM) {
        TransitionKind::TempoChange
    } else if energy_match > ENERGY_MIX_MATCH {
        TransitionKind::EnergyMix
    } else if bpm_diff.is_some_and(|d| d <= BEAT_MATCH_BPM) {
        TransitionKind::BeatMatched
    } else {
        TransitionKind::StandardCrossfade
    };

    let key_score = match wheel_distance {
        _ if harmonic => 1.0,
        // The furthest two keys can be is 6 steps plus a letter change
        Some(distance) => 1.0 - distance as f32 / 7.0,
        None => 0.0,
    };
    let tempo_score = bpm_diff.map_or(0.0, |d| 1.0 - (d / TEMPO_CHANGE_BPM).min(1.0));
    let score = (HARMONIC_WEIGHT * key_score
        + ENERGY_WEIGHT * energy_match
        + TEMPO_WEIGHT * tempo_score)
        .clamp(0.0, 1.0);

    let crossfade_secs = if current.bpm > 0.0 {
        CROSSFADE_BEATS * 60.0 / current.bpm as f64
    } else {
        FALLBACK_CROSSFADE_SECS
    };

    let suggestion = TransitionSuggestion {
        kind,
        score,
        harmonic,
        wheel_distance,
        bpm_diff,
        energy_match,
        mix_out_point: current.structure.mix_out_point,
        mix_in_point: next.structure.mix_in_point,
        crossfade_secs,
    };
    debug!(kind = %suggestion.kind, score, "transition suggested");
    suggestion
}

/// Absolute BPM gap, also trying the next track at half and double time
fn tempo_gap(current: f32, next: f32) -> Option<f32> {
    if current <= 0.0 || next <= 0.0 {
        return None;
    }
    [next, next * 2.0, next / 2.0]
        .into_iter()
        .map(|candidate| (current - candidate).abs())
        .reduce(f32::min)
}

fn energy_match(a: f32, b: f32) -> f32 {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    if high <= 0.0 {
        // Two silent tracks match exactly
        1.0
    } else {
        (low / high).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::TrackAnalyzer;
    use crate::config::AnalyzerConfig;
    use std::f32::consts::PI;

    /// A real analysis record, then overridden with the fields under test
    fn features(bpm: f32, camelot: &str, rms: f32) -> AudioFeatures {
        let analyzer = TrackAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let tone: Vec<f32> = (0..8000 * 30)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 8000.0).sin())
            .collect();
        let mut features = analyzer.analyze(8000, &tone).unwrap();
        features.bpm = bpm;
        features.camelot_key = camelot.to_string();
        features.rms_energy = rms;
        features
    }

    #[test]
    fn test_harmonic_mix() {
        let current = features(124.0, "8A", 0.30);
        let next = features(125.0, "9A", 0.28);
        let suggestion = suggest_transition(&current, &next);

        assert_eq!(suggestion.kind, TransitionKind::HarmonicMix);
        assert!(suggestion.harmonic);
        assert_eq!(suggestion.wheel_distance, Some(1));
        assert_eq!(suggestion.bpm_diff, Some(1.0));
        assert!(suggestion.score > 0.8, "score {}", suggestion.score);
        assert!((suggestion.crossfade_secs - 16.0 * 60.0 / 124.0).abs() < 1e-9);
        assert_eq!(suggestion.mix_out_point, current.structure.mix_out_point);
        assert_eq!(suggestion.mix_in_point, next.structure.mix_in_point);
    }

    #[test]
    fn test_tempo_change() {
        let suggestion = suggest_transition(&features(90.0, "8A", 0.3), &features(128.0, "3B", 0.1));
        assert_eq!(suggestion.kind, TransitionKind::TempoChange);
        assert!(!suggestion.harmonic);
        assert_eq!(suggestion.bpm_diff, Some(26.0));
    }

    #[test]
    fn test_double_time_counts_as_matched() {
        let suggestion = suggest_transition(&features(140.0, "8A", 0.3), &features(70.0, "3B", 0.1));
        assert_eq!(suggestion.bpm_diff, Some(0.0));
        assert_eq!(suggestion.kind, TransitionKind::BeatMatched);
    }

    #[test]
    fn test_energy_mix() {
        let suggestion = suggest_transition(&features(120.0, "8A", 0.3), &features(127.0, "3B", 0.29));
        assert_eq!(suggestion.kind, TransitionKind::EnergyMix);
        assert!(suggestion.energy_match > 0.9);
    }

    #[test]
    fn test_unknown_keys_and_tempo() {
        let suggestion =
            suggest_transition(&features(0.0, "Unknown", 0.3), &features(120.0, "8A", 0.1));
        assert_eq!(suggestion.kind, TransitionKind::StandardCrossfade);
        assert_eq!(suggestion.wheel_distance, None);
        assert_eq!(suggestion.bpm_diff, None);
        assert_eq!(suggestion.crossfade_secs, 24.0);
        assert!((0.0..=1.0).contains(&suggestion.score));
        assert_eq!(suggestion.kind.to_string(), "Standard Crossfade");
    }

    #[test]
    fn test_energy_match() {
        assert_eq!(energy_match(0.0, 0.0), 1.0);
        assert_eq!(energy_match(0.0, 0.5), 0.0);
        assert!((energy_match(0.4, 0.2) - 0.5).abs() < 1e-6);
    }
}
