//! Error types for track analysis

use thiserror::Error;

/// Small constant guarding divisions by near-zero magnitudes and sums
pub const EPSILON: f32 = 1e-4;

/// Errors that can occur while analyzing a buffer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Audio buffer is empty")]
    EmptyBuffer,
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),
    #[error("Frame length {0} is not a power of two")]
    NonPowerOfTwo(usize),
    #[error("Frame has {actual} samples, transform expects {expected}")]
    FrameLengthMismatch { expected: usize, actual: usize },
    #[error("Audio buffer has no channels")]
    NoChannels,
    #[error("Channel {channel} has {actual} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Analysis was cancelled")]
    Cancelled,
}

/// Fail fast on inputs no analysis can make sense of
pub(crate) fn validate_input(sample_rate: u32, samples: &[f32]) -> Result<(), AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidSampleRate(sample_rate));
    }
    if samples.is_empty() {
        return Err(AnalysisError::EmptyBuffer);
    }
    Ok(())
}
