//! Hann windowing and overlapping frame iteration

use std::f32::consts::PI;

/// Pre-compute a symmetric Hann window of `len` points
///
/// `w[i] = 0.5 * (1 - cos(2*pi*i / (len - 1)))`
pub fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos()))
        .collect()
}

/// Apply a Hann window to a frame, returning the windowed copy
pub fn apply_hann(frame: &[f32]) -> Vec<f32> {
    frame
        .iter()
        .zip(hann_window(frame.len()))
        .map(|(s, w)| s * w)
        .collect()
}

/// Iterate over every full frame of `size` samples, advancing by `hop`
pub fn frames(samples: &[f32], size: usize, hop: usize) -> impl Iterator<Item = &[f32]> {
    let hop = hop.max(1);
    let count = if size == 0 || samples.len() < size {
        0
    } else {
        (samples.len() - size) / hop + 1
    };
    (0..count).map(move |i| &samples[i * hop..i * hop + size])
}
