//! Key detection using chroma analysis
//!
//! Implements key-finding via chroma correlation:
//! 1. Accumulate a 12-bin pitch class distribution over windowed STFT frames
//! 2. Correlate with Krumhansl-Schmuckler major and minor profiles at every rotation
//! 3. Return whichever mode scores higher, with a normalized confidence

use crate::camelot::{CamelotKey, MusicalKey};
use crate::cancel::CancellationToken;
use crate::confidence::Confidence;
use crate::error::{validate_input, AnalysisError};
use crate::fft::Fft;
use crate::window::{frames, hann_window};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Krumhansl-Schmuckler major key profile. Index 0 = tonic.
const MAJOR_PROFILE: [f32; 12] = [
    6.35, // Tonic (I)
    2.23, // Minor 2nd
    3.48, // Major 2nd
    2.33, // Minor 3rd
    4.38, // Major 3rd
    4.09, // Perfect 4th
    2.52, // Tritone
    5.19, // Perfect 5th
    2.39, // Minor 6th
    3.66, // Major 6th
    2.29, // Minor 7th
    2.88, // Major 7th
];

/// Krumhansl-Schmuckler minor key profile. Index 0 = tonic.
const MINOR_PROFILE: [f32; 12] = [
    6.33, // Tonic (i)
    2.68, // Minor 2nd
    3.52, // Major 2nd
    5.38, // Minor 3rd
    2.60, // Major 3rd
    3.53, // Perfect 4th
    2.54, // Tritone
    4.75, // Perfect 5th
    3.98, // Minor 6th
    2.69, // Major 6th
    3.34, // Minor 7th
    3.17, // Major 7th
];

/// Reference frequency for A4 (440 Hz)
const A4_FREQ: f32 = 440.0;

/// Bins outside this range do not contribute to the chroma vector
const MIN_FREQ: f32 = 40.0;
const MAX_FREQ: f32 = 5000.0;

/// Detected key with confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// The detected musical key
    pub key: MusicalKey,
    pub confidence: Confidence,
}

impl KeyEstimate {
    /// Label such as "C# Minor"
    pub fn label(&self) -> String {
        self.key.label()
    }

    pub fn camelot(&self) -> CamelotKey {
        CamelotKey::from_musical_key(self.key)
    }
}

/// Key estimator using chroma-based detection
#[derive(Debug, Clone)]
pub struct KeyEstimator {
    fft_size: usize,
    hop_size: usize,
    fft: Fft,
    window: Vec<f32>,
}

impl KeyEstimator {
    /// Create a new key estimator
    ///
    /// Uses a 4096-sample FFT for good frequency resolution at low frequencies.
    pub fn new() -> Result<Self, AnalysisError> {
        let fft_size = 4096; // Larger for better frequency resolution
        let hop_size = 2048; // 50% overlap

        Ok(Self {
            fft_size,
            hop_size,
            fft: Fft::new(fft_size)?,
            window: hann_window(fft_size),
        })
    }

    /// Detect the key of a mono buffer
    ///
    /// Buffers shorter than one frame produce an all-zero chroma vector and
    /// a zero-confidence result rather than an error.
    pub fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<KeyEstimate, AnalysisError> {
        self.estimate_with_cancel(samples, sample_rate, &CancellationToken::new())
    }

    pub(crate) fn estimate_with_cancel(
        &self,
        samples: &[f32],
        sample_rate: u32,
        cancel: &CancellationToken,
    ) -> Result<KeyEstimate, AnalysisError> {
        validate_input(sample_rate, samples)?;

        let chroma = self.compute_chroma(samples, sample_rate, cancel)?;
        let estimate = match_key_profiles(&chroma);

        debug!(
            key = %estimate.key,
            confidence = estimate.confidence.value(),
            "key estimated"
        );
        Ok(estimate)
    }

    /// Map each FFT bin to its closest pitch class (0-11, where 0=C)
    fn pitch_class_mapping(&self, sample_rate: u32) -> Vec<Option<usize>> {
        (0..self.fft_size / 2)
            .map(|bin| {
                let freq = bin as f32 * sample_rate as f32 / self.fft_size as f32;
                if !(MIN_FREQ..=MAX_FREQ).contains(&freq) {
                    return None;
                }
                // pitch = 12 * log2(freq / 440) + 69 (MIDI note number)
                let midi_note = 12.0 * (freq / A4_FREQ).log2() + 69.0;
                Some((midi_note.round() as i64).rem_euclid(12) as usize)
            })
            .collect()
    }

    /// Accumulate bin magnitudes into pitch classes across all frames
    fn compute_chroma(
        &self,
        samples: &[f32],
        sample_rate: u32,
        cancel: &CancellationToken,
    ) -> Result<[f32; 12], AnalysisError> {
        let mapping = self.pitch_class_mapping(sample_rate);
        let mut chroma = [0.0f32; 12];
        let mut windowed = vec![0.0f32; self.fft_size];

        for frame in frames(samples, self.fft_size, self.hop_size) {
            cancel.check()?;
            for ((slot, s), w) in windowed.iter_mut().zip(frame).zip(&self.window) {
                *slot = s * w;
            }
            let spectrum = self.fft.magnitude_spectrum(&windowed)?;
            for (magnitude, pitch_class) in spectrum.iter().zip(&mapping) {
                if let Some(pc) = pitch_class {
                    chroma[*pc] += magnitude;
                }
            }
        }

        Ok(chroma)
    }
}

/// Score the chroma vector against both profiles at all 12 rotations
///
/// Best major and best minor are tracked independently and normalized by
/// `max(chroma) * sum(profile)` so they are comparable. Ties go to minor.
fn match_key_profiles(chroma: &[f32; 12]) -> KeyEstimate {
    let mut best_major = (0u8, f32::NEG_INFINITY);
    let mut best_minor = (0u8, f32::NEG_INFINITY);

    for root in 0..12u8 {
        let rotated = rotate_chroma(chroma, root);
        let major = dot(&rotated, &MAJOR_PROFILE);
        let minor = dot(&rotated, &MINOR_PROFILE);

        if major > best_major.1 {
            best_major = (root, major);
        }
        if minor > best_minor.1 {
            best_minor = (root, minor);
        }
    }

    let max_chroma = chroma.iter().copied().fold(0.0f32, f32::max);
    let normalize = |score: f32, profile: &[f32; 12]| {
        let denom = max_chroma * profile.iter().sum::<f32>();
        if denom > 0.0 {
            score / denom
        } else {
            0.0
        }
    };
    let major_confidence = normalize(best_major.1, &MAJOR_PROFILE);
    let minor_confidence = normalize(best_minor.1, &MINOR_PROFILE);

    if major_confidence > minor_confidence {
        KeyEstimate {
            key: MusicalKey::major_from_pitch_class(best_major.0),
            confidence: Confidence::computed(major_confidence),
        }
    } else {
        KeyEstimate {
            key: MusicalKey::minor_from_pitch_class(best_minor.0),
            confidence: Confidence::computed(minor_confidence),
        }
    }
}

/// Rotate chroma so that the given pitch class becomes index 0
fn rotate_chroma(chroma: &[f32; 12], root: u8) -> [f32; 12] {
    let mut rotated = [0.0f32; 12];
    for (i, slot) in rotated.iter_mut().enumerate() {
        *slot = chroma[(i + root as usize) % 12];
    }
    rotated
}

fn dot(a: &[f32; 12], b: &[f32; 12]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn chord(freqs: &[f32], sample_rate: u32, seconds: f32) -> Vec<f32> {
        let total = (sample_rate as f32 * seconds) as usize;
        let gain = 1.0 / freqs.len() as f32;
        (0..total)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() * gain
            })
            .collect()
    }

    #[test]
    fn test_pitch_class_mapping() {
        let estimator = KeyEstimator::new().unwrap();
        let mapping = estimator.pitch_class_mapping(44100);
        assert_eq!(mapping.len(), 2048);

        // Bin 0 (DC) and everything above 5 kHz are excluded
        assert_eq!(mapping[0], None);
        assert_eq!(mapping[2047], None);

        // 440 Hz lands in bin ~40.9 -> A
        let bin = (440.0 * 4096.0 / 44100.0f32).round() as usize;
        assert_eq!(mapping[bin], Some(9));

        // Bin 24 is ~258.4 Hz, MIDI note ~59.79: rounds up to 60 and folds into C
        assert_eq!(mapping[24], Some(0));
    }

    #[test]
    fn test_rotate_chroma() {
        let chroma = [
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
        ];

        // Rotate by 0 should give same array
        assert_eq!(rotate_chroma(&chroma, 0), chroma);

        // Rotate by 1
        let rotated = rotate_chroma(&chroma, 1);
        assert_eq!(rotated[0], 2.0); // Was at index 1
        assert_eq!(rotated[11], 1.0); // Was at index 0
    }

    #[test]
    fn test_profile_match_major() {
        // Exactly the major profile rooted at D
        let chroma = rotate_chroma(&MAJOR_PROFILE, 10);
        let estimate = match_key_profiles(&chroma);
        assert_eq!(estimate.key, MusicalKey::DMajor);
        assert_eq!(estimate.label(), "D Major");
    }

    #[test]
    fn test_profile_match_minor() {
        // Minor profile rooted at A: chroma[(i + 9) % 12] = profile[i]
        let mut chroma = [0.0f32; 12];
        for (i, &weight) in MINOR_PROFILE.iter().enumerate() {
            chroma[(i + 9) % 12] = weight;
        }
        let estimate = match_key_profiles(&chroma);
        assert_eq!(estimate.key, MusicalKey::AMinor);
        assert_eq!(estimate.camelot().display(), "8A");
        assert!(estimate.confidence.value() > 0.0 && estimate.confidence.value() <= 1.0);
    }

    #[test]
    fn test_silence_is_zero_confidence() {
        let estimator = KeyEstimator::new().unwrap();
        let estimate = estimator.estimate(&vec![0.0f32; 44100], 44100).unwrap();
        assert_eq!(estimate.confidence.value(), 0.0);
    }

    #[test]
    fn test_short_buffer() {
        let estimator = KeyEstimator::new().unwrap();
        let estimate = estimator.estimate(&[0.1; 100], 44100).unwrap();
        assert_eq!(estimate.confidence.value(), 0.0);
    }

    #[test]
    fn test_invalid_input() {
        let estimator = KeyEstimator::new().unwrap();
        assert_eq!(estimator.estimate(&[], 44100), Err(AnalysisError::EmptyBuffer));
    }

    // Synthetic test: C major triad with a doubled tonic
    #[test]
    fn test_detect_c_major_chord() {
        let samples = chord(&[261.63, 329.63, 392.00, 523.25], 44100, 3.0);
        let estimate = KeyEstimator::new().unwrap().estimate(&samples, 44100).unwrap();
        assert_eq!(estimate.label(), "C Major");
        assert_eq!(estimate.camelot().display(), "8B");
    }
}
