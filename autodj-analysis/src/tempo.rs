//! Tempo estimation via onset-envelope autocorrelation
//!
//! 1. Single-pole lowpass (~100 Hz) to emphasize kick energy
//! 2. Decimate to roughly 1 kHz
//! 3. Onset envelope over a bounded look-back window
//! 4. Autocorrelate and pick the strongest lag inside the 60-200 BPM range

use crate::cancel::CancellationToken;
use crate::confidence::Confidence;
use crate::error::{validate_input, AnalysisError};
use crate::fft::autocorrelation;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use tracing::{debug, trace};

/// Slowest tempo considered
pub const MIN_BPM: f32 = 60.0;
/// Fastest tempo considered
pub const MAX_BPM: f32 = 200.0;

/// Detected tempo with confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Beats per minute, rounded to one decimal place
    pub bpm: f32,
    /// Autocorrelation strength of the chosen lag relative to the strongest lag
    pub confidence: Confidence,
}

/// Autocorrelation-based tempo estimator
#[derive(Debug, Clone)]
pub struct TempoEstimator {
    cutoff_hz: f32,
    /// Look-back bound of the onset envelope, in decimated samples
    onset_window: usize,
    min_bpm: f32,
    max_bpm: f32,
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoEstimator {
    pub fn new() -> Self {
        Self {
            cutoff_hz: 100.0,
            onset_window: 1024,
            min_bpm: MIN_BPM,
            max_bpm: MAX_BPM,
        }
    }

    /// Estimate the tempo of a mono buffer
    ///
    /// Silence and very short buffers do not fail; they come back with a
    /// near-zero confidence.
    pub fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<TempoEstimate, AnalysisError> {
        self.estimate_with_cancel(samples, sample_rate, &CancellationToken::new())
    }

    pub(crate) fn estimate_with_cancel(
        &self,
        samples: &[f32],
        sample_rate: u32,
        cancel: &CancellationToken,
    ) -> Result<TempoEstimate, AnalysisError> {
        validate_input(sample_rate, samples)?;

        let factor = ((sample_rate / 1000) as usize).max(1);
        let rate = sample_rate as f32 / factor as f32;

        let filtered = lowpass(samples, self.cutoff_hz, sample_rate);
        let decimated = decimate(&filtered, factor);
        cancel.check()?;

        let onset = onset_envelope(&decimated, self.onset_window);
        cancel.check()?;

        let min_lag = ((rate * 60.0 / self.max_bpm).floor() as usize).max(1);
        let max_lag = (rate * 60.0 / self.min_bpm).ceil() as usize;

        if onset.len() <= min_lag {
            debug!(
                samples = samples.len(),
                min_lag, "buffer too short for tempo search"
            );
            return Ok(TempoEstimate {
                bpm: round_bpm(60.0 * rate / min_lag as f32),
                confidence: Confidence::computed(0.0),
            });
        }

        let acf = autocorrelation(&onset)?;
        cancel.check()?;

        let mut best_lag = min_lag;
        let mut best_val = f32::NEG_INFINITY;
        for (lag, &value) in acf
            .iter()
            .enumerate()
            .take(max_lag.min(acf.len() - 1) + 1)
            .skip(min_lag)
        {
            if value > best_val {
                best_val = value;
                best_lag = lag;
            }
        }

        let strongest = acf[min_lag..].iter().copied().fold(0.0f32, f32::max);
        let confidence = if strongest > 0.0 {
            best_val / strongest
        } else {
            0.0
        };

        let bpm = round_bpm(60.0 / (best_lag as f32 / rate));
        trace!(best_lag, best_val, strongest, "autocorrelation peak");
        debug!(bpm, confidence, "tempo estimated");

        Ok(TempoEstimate {
            bpm,
            confidence: Confidence::computed(confidence),
        })
    }
}

fn round_bpm(bpm: f32) -> f32 {
    (bpm * 10.0).round() / 10.0
}

/// Single-pole IIR lowpass: `y[i] = y[i-1] + alpha * (x[i] - y[i-1])`
fn lowpass(samples: &[f32], cutoff_hz: f32, sample_rate: u32) -> Vec<f32> {
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f32;
    let alpha = dt / (rc + dt);

    let mut result = Vec::with_capacity(samples.len());
    let mut prev = match samples.first() {
        Some(&first) => first,
        None => return result,
    };
    result.push(prev);
    for &sample in &samples[1..] {
        prev += alpha * (sample - prev);
        result.push(prev);
    }
    result
}

/// Keep every `factor`-th sample
fn decimate(samples: &[f32], factor: usize) -> Vec<f32> {
    samples.iter().step_by(factor.max(1)).take(samples.len() / factor.max(1)).copied().collect()
}

/// RMS deviation of each sample from the samples before it
///
/// `e[i] = sqrt(sum((x[i] - x[j])^2) / (count + 1))` over the previous `window`
/// samples. Running sums keep this linear in the signal length.
fn onset_envelope(samples: &[f32], window: usize) -> Vec<f32> {
    let window = window.max(1);
    let mut result = Vec::with_capacity(samples.len());
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;

    for (i, &x) in samples.iter().enumerate() {
        let count = i.min(window) as f64;
        let x = x as f64;
        let deviation = (count * x * x - 2.0 * x * sum + sum_sq).max(0.0);
        result.push((deviation / (count + 1.0)).sqrt() as f32);

        sum += x;
        sum_sq += x * x;
        if i >= window {
            let old = samples[i - window] as f64;
            sum -= old;
            sum_sq -= old * old;
        }
    }

    result
}
