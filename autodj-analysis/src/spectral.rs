//! Spectral shape descriptors over windowed STFT frames
//!
//! Per-frame centroid, bandwidth, rolloff, flux and flatness are summed over
//! every frame and divided by the frame count once the loop is done.

use crate::cancel::CancellationToken;
use crate::error::{validate_input, AnalysisError, EPSILON};
use crate::fft::Fft;
use crate::window::{frames, hann_window};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of coefficients in the (placeholder) MFCC vector
pub const MFCC_COEFFICIENTS: usize = 13;

/// Fraction of spectral magnitude below the rolloff frequency
const ROLLOFF_FRACTION: f32 = 0.85;

/// Centroid at which brightness saturates (Hz)
const BRIGHTNESS_CEILING_HZ: f32 = 10_000.0;

/// Upper edges of the bass and mid bands, and the top of the high band (Hz)
const BASS_MAX_HZ: f32 = 200.0;
const MID_MAX_HZ: f32 = 2000.0;
const HIGH_MAX_HZ: f32 = 8000.0;

/// Dominant frequency band of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrequencyBand {
    /// Bass frequencies (<200Hz) - kicks, bass
    Bass,
    /// Mid frequencies (200Hz-2kHz) - vocals, instruments
    #[default]
    Mid,
    /// High frequencies (2kHz-8kHz) - hi-hats, cymbals
    High,
}

/// Per-band magnitude statistics across all frames
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrequencyBands {
    /// Mean per-frame magnitude sum
    pub bass_mean: f32,
    pub mid_mean: f32,
    pub high_mean: f32,
    /// Largest per-frame magnitude sum
    pub bass_peak: f32,
    pub mid_peak: f32,
    pub high_peak: f32,
    /// Magnitude summed over every frame
    pub bass_energy: f32,
    pub mid_energy: f32,
    pub high_energy: f32,
    pub bass_mid_ratio: f32,
    pub mid_high_ratio: f32,
    pub dominant: FrequencyBand,
}

/// Aggregate spectral descriptors of a buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralInfo {
    /// Mean magnitude-weighted frequency (Hz)
    pub centroid: f32,
    /// Mean magnitude-weighted spread around the centroid (Hz)
    pub bandwidth: f32,
    /// Mean frequency below which 85% of the magnitude lies (Hz)
    pub rolloff: f32,
    /// Mean half-wave rectified change between consecutive spectra
    pub flux: f32,
    /// Mean ratio of geometric to arithmetic magnitude mean (0 tonal .. 1 noise)
    pub flatness: f32,
    /// Not computed: always 13 zeros
    pub mfcc: Vec<f32>,
    /// Frequency of the largest magnitude seen in any frame (Hz)
    pub peak_frequency: f32,
    /// Centroid relative to 10 kHz, in `[0, 1]`
    pub brightness: f32,
    /// `1 - brightness`
    pub warmth: f32,
    /// Noisiness of the timbre; equal to the mean flatness, clamped to `[0, 1]`
    pub roughness: f32,
    pub bands: FrequencyBands,
}

/// Descriptors of a single magnitude spectrum
struct FrameFeatures {
    centroid: f32,
    bandwidth: f32,
    rolloff: f32,
    flatness: f32,
}

/// STFT-based spectral analyzer
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    fft_size: usize,
    hop_size: usize,
    fft: Fft,
    window: Vec<f32>,
}

impl SpectralAnalyzer {
    /// Create an analyzer with `fft_size`-sample frames and 50% overlap
    pub fn new(fft_size: usize) -> Result<Self, AnalysisError> {
        let fft = Fft::new(fft_size)?;
        Ok(Self {
            fft_size,
            hop_size: (fft_size / 2).max(1),
            fft,
            window: hann_window(fft_size),
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Analyze a mono buffer
    ///
    /// A buffer shorter than one frame is zero-padded to a single frame.
    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> Result<SpectralInfo, AnalysisError> {
        self.analyze_with_cancel(samples, sample_rate, &CancellationToken::new())
    }

    pub(crate) fn analyze_with_cancel(
        &self,
        samples: &[f32],
        sample_rate: u32,
        cancel: &CancellationToken,
    ) -> Result<SpectralInfo, AnalysisError> {
        validate_input(sample_rate, samples)?;

        let padded;
        let samples = if samples.len() < self.fft_size {
            let mut buffer = samples.to_vec();
            buffer.resize(self.fft_size, 0.0);
            padded = buffer;
            &padded[..]
        } else {
            samples
        };

        let bin_hz = sample_rate as f32 / self.fft_size as f32;
        let bins = self.fft_size / 2;
        let bass_end = ((BASS_MAX_HZ / bin_hz) as usize).min(bins);
        let mid_end = ((MID_MAX_HZ / bin_hz) as usize).clamp(bass_end, bins);
        let high_end = ((HIGH_MAX_HZ / bin_hz) as usize).clamp(mid_end, bins);

        let mut centroid_sum = 0.0f64;
        let mut bandwidth_sum = 0.0f64;
        let mut rolloff_sum = 0.0f64;
        let mut flux_sum = 0.0f64;
        let mut flatness_sum = 0.0f64;
        let mut peak_magnitude = 0.0f32;
        let mut peak_frequency = 0.0f32;
        let mut band_sums = [0.0f64; 3];
        let mut band_peaks = [0.0f32; 3];
        let mut frame_count = 0usize;

        let mut windowed = vec![0.0f32; self.fft_size];
        let mut previous: Option<Vec<f32>> = None;

        for frame in frames(samples, self.fft_size, self.hop_size) {
            cancel.check()?;
            for ((slot, s), w) in windowed.iter_mut().zip(frame).zip(&self.window) {
                *slot = s * w;
            }
            let spectrum = self.fft.magnitude_spectrum(&windowed)?;

            let features = frame_features(&spectrum, bin_hz);
            centroid_sum += features.centroid as f64;
            bandwidth_sum += features.bandwidth as f64;
            rolloff_sum += features.rolloff as f64;
            flatness_sum += features.flatness as f64;

            if let Some(prev) = &previous {
                flux_sum += spectral_flux(&spectrum, prev) as f64;
            }

            for (bin, &magnitude) in spectrum.iter().enumerate() {
                if magnitude > peak_magnitude {
                    peak_magnitude = magnitude;
                    peak_frequency = bin as f32 * bin_hz;
                }
            }

            let frame_bands = [
                spectrum[..bass_end].iter().sum::<f32>(),
                spectrum[bass_end..mid_end].iter().sum::<f32>(),
                spectrum[mid_end..high_end].iter().sum::<f32>(),
            ];
            for i in 0..3 {
                band_sums[i] += frame_bands[i] as f64;
                band_peaks[i] = band_peaks[i].max(frame_bands[i]);
            }

            previous = Some(spectrum);
            frame_count += 1;
        }

        let count = frame_count.max(1) as f64;
        let bands = frequency_bands(band_sums, band_peaks, count);

        let centroid = (centroid_sum / count) as f32;
        let flatness = (flatness_sum / count) as f32;
        let brightness = (centroid / BRIGHTNESS_CEILING_HZ).clamp(0.0, 1.0);

        let info = SpectralInfo {
            centroid,
            bandwidth: (bandwidth_sum / count) as f32,
            rolloff: (rolloff_sum / count) as f32,
            flux: (flux_sum / count) as f32,
            flatness,
            mfcc: vec![0.0; MFCC_COEFFICIENTS],
            peak_frequency,
            brightness,
            warmth: 1.0 - brightness,
            roughness: flatness.clamp(0.0, 1.0),
            bands,
        };

        debug!(
            frames = frame_count,
            centroid = info.centroid,
            peak_frequency = info.peak_frequency,
            "spectral features computed"
        );
        Ok(info)
    }
}

fn frame_features(spectrum: &[f32], bin_hz: f32) -> FrameFeatures {
    let magnitude_sum: f32 = spectrum.iter().sum();

    let weighted: f32 = spectrum
        .iter()
        .enumerate()
        .map(|(bin, m)| bin as f32 * bin_hz * m)
        .sum();
    let centroid = if magnitude_sum > EPSILON {
        weighted / magnitude_sum
    } else {
        0.0
    };

    let spread: f32 = spectrum
        .iter()
        .enumerate()
        .map(|(bin, m)| (bin as f32 * bin_hz - centroid).powi(2) * m)
        .sum();
    let bandwidth = if magnitude_sum > EPSILON {
        (spread / magnitude_sum).sqrt()
    } else {
        0.0
    };

    let mut remaining = magnitude_sum * ROLLOFF_FRACTION;
    let mut rolloff = 0.0;
    for (bin, &m) in spectrum.iter().enumerate() {
        remaining -= m;
        if remaining <= 0.0 {
            rolloff = bin as f32 * bin_hz;
            break;
        }
    }

    let n = spectrum.len().max(1) as f32;
    let log_mean = spectrum.iter().map(|m| (m + EPSILON).ln()).sum::<f32>() / n;
    let flatness = log_mean.exp() / (magnitude_sum / n + EPSILON);

    FrameFeatures {
        centroid,
        bandwidth,
        rolloff,
        flatness,
    }
}

/// L2 norm of the magnitude increases since the previous frame
fn spectral_flux(spectrum: &[f32], previous: &[f32]) -> f32 {
    spectrum
        .iter()
        .zip(previous)
        .map(|(curr, prev)| (curr - prev).max(0.0).powi(2))
        .sum::<f32>()
        .sqrt()
}

fn frequency_bands(sums: [f64; 3], peaks: [f32; 3], frame_count: f64) -> FrequencyBands {
    let [bass_mean, mid_mean, high_mean] = sums.map(|s| (s / frame_count) as f32);

    let dominant = if bass_mean >= mid_mean && bass_mean >= high_mean {
        FrequencyBand::Bass
    } else if high_mean >= mid_mean {
        FrequencyBand::High
    } else {
        FrequencyBand::Mid
    };

    FrequencyBands {
        bass_mean,
        mid_mean,
        high_mean,
        bass_peak: peaks[0],
        mid_peak: peaks[1],
        high_peak: peaks[2],
        bass_energy: sums[0] as f32,
        mid_energy: sums[1] as f32,
        high_energy: sums[2] as f32,
        bass_mid_ratio: bass_mean / (mid_mean + EPSILON),
        mid_high_ratio: mid_mean / (high_mean + EPSILON),
        dominant,
    }
}
