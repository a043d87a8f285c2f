//! Loudness, dynamics and envelope timing

use crate::error::{validate_input, AnalysisError, EPSILON};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Frame length of the amplitude envelope
pub const ENERGY_FRAME_SIZE: usize = 1024;

/// Loudness floor in dB
pub const LOUDNESS_FLOOR_DB: f32 = -60.0;

/// Dynamic range ceiling in dB
pub const DYNAMIC_RANGE_CEILING_DB: f32 = 60.0;

/// Number of equal sections in the energy profile
pub const PROFILE_SECTIONS: usize = 16;

/// Energy statistics of a buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyInfo {
    /// Mean of the squared samples
    pub mean_energy: f32,
    /// Root mean square of the frame envelope
    pub rms: f32,
    /// `20 * log10(rms)`, floored at -60 dB
    pub loudness: f32,
    /// Loudest over quietest frame envelope in dB, capped at 60 dB
    pub dynamic_range: f32,
    /// Seconds from the attack start to the envelope peak
    pub attack_time: f32,
    /// Seconds from the envelope peak until it falls below half
    pub decay_time: f32,
    /// Mean absolute amplitude per frame
    pub envelope: Vec<f32>,
}

/// Coarse loudness shape of the whole track
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyProfile {
    /// RMS of each of the 16 sections
    pub sections: Vec<f32>,
    pub average: f32,
    pub peak: f32,
    pub valley: f32,
    pub variance: f32,
    /// Mean positive rise between consecutive sections
    pub momentum: f32,
}

/// Frame-envelope energy analyzer
#[derive(Debug, Clone)]
pub struct EnergyAnalyzer {
    frame_size: usize,
}

impl Default for EnergyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyAnalyzer {
    pub fn new() -> Self {
        Self {
            frame_size: ENERGY_FRAME_SIZE,
        }
    }

    /// Analyze the amplitude envelope of a mono buffer
    ///
    /// Attack and decay times are converted with the buffer's own sample rate.
    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> Result<EnergyInfo, AnalysisError> {
        validate_input(sample_rate, samples)?;

        let mean_energy = mean_square(samples) as f32;

        let envelope: Vec<f32> = samples
            .chunks_exact(self.frame_size)
            .map(|frame| frame.iter().map(|s| s.abs()).sum::<f32>() / self.frame_size as f32)
            .collect();

        if envelope.is_empty() {
            debug!(samples = samples.len(), "buffer shorter than one energy frame");
            return Ok(EnergyInfo {
                mean_energy,
                rms: 0.0,
                loudness: LOUDNESS_FLOOR_DB,
                dynamic_range: 0.0,
                attack_time: 0.0,
                decay_time: 0.0,
                envelope,
            });
        }

        let mut peak = f32::NEG_INFINITY;
        let mut trough = f32::INFINITY;
        let mut peak_frame = 0;
        for (i, &value) in envelope.iter().enumerate() {
            if value > peak {
                peak = value;
                peak_frame = i;
            }
            trough = trough.min(value);
        }

        let rms = mean_square(&envelope).sqrt() as f32;
        let loudness = (20.0 * (rms + EPSILON).log10()).max(LOUDNESS_FLOOR_DB);
        let dynamic_range =
            (20.0 * ((peak + EPSILON) / (trough + EPSILON)).log10()).min(DYNAMIC_RANGE_CEILING_DB);

        let onset_threshold = envelope[0] * 1.5;
        let attack_start = envelope[..peak_frame]
            .iter()
            .position(|&e| e > onset_threshold)
            .unwrap_or(0);

        let decay_end = envelope[peak_frame..]
            .iter()
            .position(|&e| e < peak * 0.5)
            .map(|offset| peak_frame + offset)
            .unwrap_or(envelope.len() - 1);

        let frame_secs = self.frame_size as f32 / sample_rate as f32;
        let attack_time = (peak_frame - attack_start) as f32 * frame_secs;
        let decay_time = (decay_end - peak_frame) as f32 * frame_secs;

        debug!(rms, loudness, dynamic_range, "energy analyzed");

        Ok(EnergyInfo {
            mean_energy,
            rms,
            loudness,
            dynamic_range,
            attack_time,
            decay_time,
            envelope,
        })
    }
}

/// RMS of each of 16 equal sections and their overall shape
pub fn energy_profile(samples: &[f32]) -> EnergyProfile {
    let section_len = samples.len() / PROFILE_SECTIONS;
    if section_len == 0 {
        return EnergyProfile::default();
    }

    let sections: Vec<f32> = samples
        .chunks_exact(section_len)
        .take(PROFILE_SECTIONS)
        .map(|section| mean_square(section).sqrt() as f32)
        .collect();

    let count = sections.len() as f32;
    let average = sections.iter().sum::<f32>() / count;
    let peak = sections.iter().copied().fold(0.0f32, f32::max);
    let valley = sections.iter().copied().fold(f32::INFINITY, f32::min);
    let variance = sections.iter().map(|e| (e - average).powi(2)).sum::<f32>() / count;

    // First section counts its own level as the rise from silence
    let momentum = (sections[0]
        + sections
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).max(0.0))
            .sum::<f32>())
        / count;

    EnergyProfile {
        sections,
        average,
        peak,
        valley,
        variance,
        momentum,
    }
}

/// Mean of the squared values, accumulated in f64 so long tracks do not lose precision
fn mean_square(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| (v as f64).powi(2)).sum::<f64>() / values.len() as f64
}

/// Fraction of consecutive sample pairs whose sign differs
///
/// Zero counts as non-negative. The count is divided by the total number of
/// samples, so an alternating signal approaches 1.0.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / samples.len() as f32
}
