//! Iterative radix-2 FFT
//!
//! Decimation-in-time Cooley-Tukey with a bit-reversal permutation and a
//! pre-computed twiddle table. A plan is immutable once built and can be
//! shared between threads.

use crate::error::AnalysisError;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// A reusable transform plan for one power-of-two length
#[derive(Debug, Clone)]
pub struct Fft {
    size: usize,
    /// `exp(-2*pi*i*k / size)` for `k` in `0..size / 2`
    twiddles: Vec<Complex<f32>>,
    /// Destination index of each input sample after the bit-reversal permutation
    bit_reversed: Vec<usize>,
}

impl Fft {
    /// Plan a transform of `size` points
    ///
    /// Fails with [`AnalysisError::NonPowerOfTwo`] unless `size` is a power of two >= 2.
    pub fn new(size: usize) -> Result<Self, AnalysisError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(AnalysisError::NonPowerOfTwo(size));
        }

        let twiddles = (0..size / 2)
            .map(|k| {
                // Twiddles are computed in f64 so large plans stay accurate
                let angle = -2.0 * PI * k as f64 / size as f64;
                Complex::new(angle.cos() as f32, angle.sin() as f32)
            })
            .collect();

        let bits = size.trailing_zeros();
        let bit_reversed = (0..size)
            .map(|i| i.reverse_bits() >> (usize::BITS - bits))
            .collect();

        Ok(Self {
            size,
            twiddles,
            bit_reversed,
        })
    }

    /// Transform length in points
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forward transform in place
    pub fn process(&self, buffer: &mut [Complex<f32>]) -> Result<(), AnalysisError> {
        if buffer.len() != self.size {
            return Err(AnalysisError::FrameLengthMismatch {
                expected: self.size,
                actual: buffer.len(),
            });
        }

        for (i, &j) in self.bit_reversed.iter().enumerate() {
            if j > i {
                buffer.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= self.size {
            let half = len / 2;
            let stride = self.size / len;
            for block in buffer.chunks_exact_mut(len) {
                let (evens, odds) = block.split_at_mut(half);
                for (k, (even, odd)) in evens.iter_mut().zip(odds.iter_mut()).enumerate() {
                    let t = *odd * self.twiddles[k * stride];
                    *odd = *even - t;
                    *even += t;
                }
            }
            len <<= 1;
        }

        Ok(())
    }

    /// Inverse transform in place, scaled by `1 / len`
    pub fn process_inverse(&self, buffer: &mut [Complex<f32>]) -> Result<(), AnalysisError> {
        for c in buffer.iter_mut() {
            *c = c.conj();
        }
        self.process(buffer)?;
        let scale = 1.0 / self.size as f32;
        for c in buffer.iter_mut() {
            *c = c.conj() * scale;
        }
        Ok(())
    }

    /// Magnitude spectrum of a real frame: `len / 2` bins of `sqrt(re^2 + im^2)`
    ///
    /// The frame is transformed as given; window it first.
    pub fn magnitude_spectrum(&self, frame: &[f32]) -> Result<Vec<f32>, AnalysisError> {
        if frame.len() != self.size {
            return Err(AnalysisError::FrameLengthMismatch {
                expected: self.size,
                actual: frame.len(),
            });
        }
        let mut buffer: Vec<Complex<f32>> = frame.iter().map(|&s| Complex::new(s, 0.0)).collect();
        self.process(&mut buffer)?;
        Ok(buffer[..self.size / 2].iter().map(|c| c.norm()).collect())
    }
}

/// One-shot magnitude spectrum of a power-of-two frame
pub fn magnitude_spectrum(frame: &[f32]) -> Result<Vec<f32>, AnalysisError> {
    Fft::new(frame.len())?.magnitude_spectrum(frame)
}

/// Biased autocorrelation `r[lag] = sum(x[i] * x[i + lag]) / n` for every lag in `0..n`
///
/// Computed through the power spectrum of the zero-padded signal.
pub fn autocorrelation(signal: &[f32]) -> Result<Vec<f32>, AnalysisError> {
    let n = signal.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let padded = (2 * n).next_power_of_two();
    let fft = Fft::new(padded)?;

    let mut buffer = vec![Complex::new(0.0f32, 0.0); padded];
    for (slot, &s) in buffer.iter_mut().zip(signal) {
        slot.re = s;
    }

    fft.process(&mut buffer)?;
    for c in buffer.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    fft.process_inverse(&mut buffer)?;

    let scale = 1.0 / n as f32;
    Ok(buffer[..n].iter().map(|c| c.re * scale).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::apply_hann;
    use rustfft::FftPlanner;
    use std::f32::consts::PI as PI32;

    #[test]
    fn test_rejects_non_power_of_two() {
        assert_eq!(Fft::new(1000).unwrap_err(), AnalysisError::NonPowerOfTwo(1000));
        assert_eq!(Fft::new(0).unwrap_err(), AnalysisError::NonPowerOfTwo(0));
        assert_eq!(Fft::new(1).unwrap_err(), AnalysisError::NonPowerOfTwo(1));
        assert_eq!(
            magnitude_spectrum(&[0.0; 3]).unwrap_err(),
            AnalysisError::NonPowerOfTwo(3)
        );
    }

    #[test]
    fn test_wrong_buffer_length() {
        let fft = Fft::new(8).unwrap();
        let mut buffer = vec![Complex::new(0.0, 0.0); 4];
        assert_eq!(
            fft.process(&mut buffer),
            Err(AnalysisError::FrameLengthMismatch {
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn test_impulse_is_flat() {
        let mut frame = vec![0.0f32; 16];
        frame[0] = 1.0;
        let spectrum = magnitude_spectrum(&frame).unwrap();
        assert_eq!(spectrum.len(), 8);
        for mag in spectrum {
            assert!((mag - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_matches_rustfft() {
        let size = 1024;
        let signal: Vec<f32> = (0..size)
            .map(|i| (i as f32 * 0.37).sin() + 0.25 * (i as f32 * 1.91).cos())
            .collect();

        let mut ours: Vec<Complex<f32>> = signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
        Fft::new(size).unwrap().process(&mut ours).unwrap();

        let mut reference: Vec<Complex<f32>> =
            signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
        FftPlanner::<f32>::new().plan_fft_forward(size).process(&mut reference);

        for (a, b) in ours.iter().zip(&reference) {
            assert!((a - b).norm() < 1e-2, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_inverse_restores_signal() {
        let fft = Fft::new(64).unwrap();
        let original: Vec<Complex<f32>> = (0..64)
            .map(|i| Complex::new((i as f32 * 0.3).sin(), 0.0))
            .collect();
        let mut buffer = original.clone();
        fft.process(&mut buffer).unwrap();
        fft.process_inverse(&mut buffer).unwrap();
        for (a, b) in buffer.iter().zip(&original) {
            assert!((a - b).norm() < 1e-5);
        }
    }

    #[test]
    fn test_sine_peak_bin() {
        let sample_rate = 44100.0f32;
        let size = 2048;
        let freq = 1000.0f32;
        let frame: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI32 * freq * i as f32 / sample_rate).sin())
            .collect();

        let spectrum = magnitude_spectrum(&apply_hann(&frame)).unwrap();
        let (peak_bin, _) = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();

        let expected = (freq * size as f32 / sample_rate).round() as usize;
        assert!(peak_bin.abs_diff(expected) <= 1, "peak {} expected {}", peak_bin, expected);
    }

    #[test]
    fn test_autocorrelation_matches_direct() {
        let signal: Vec<f32> = (0..100).map(|i| ((i % 7) as f32) - 3.0).collect();
        let fast = autocorrelation(&signal).unwrap();
        let n = signal.len();
        for lag in [0, 1, 7, 14, 50, 99] {
            let direct: f32 =
                (0..n - lag).map(|i| signal[i] * signal[i + lag]).sum::<f32>() / n as f32;
            assert!((fast[lag] - direct).abs() < 1e-3, "lag {}", lag);
        }
    }
}
