//! Decoded PCM input buffer and channel selection

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// How a multi-channel buffer is reduced to the mono signal the analyzers read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Read channel 0 only
    #[default]
    First,
    /// Average all channels sample by sample
    Mixdown,
}

impl ChannelMode {
    /// Parse from a config value ("first" or "mixdown")
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "mono" => Some(ChannelMode::First),
            "mixdown" | "mix" => Some(ChannelMode::Mixdown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelMode::First => "first",
            ChannelMode::Mixdown => "mixdown",
        }
    }
}

/// A complete, already-decoded audio buffer
///
/// Channels are stored planar (one `Vec<f32>` per channel), samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a buffer from planar channel data
    ///
    /// Every channel must have the same length and the sample rate must be positive.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        let expected = channels.first().ok_or(AnalysisError::NoChannels)?.len();
        for (channel, data) in channels.iter().enumerate().skip(1) {
            if data.len() != expected {
                return Err(AnalysisError::ChannelLengthMismatch {
                    channel,
                    expected,
                    actual: data.len(),
                });
            }
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Create a single-channel buffer
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Result<Self, AnalysisError> {
        Self::new(sample_rate, vec![samples])
    }

    /// Create a buffer from interleaved samples
    pub fn from_interleaved(
        sample_rate: u32,
        samples: &[f32],
        channel_count: usize,
    ) -> Result<Self, AnalysisError> {
        if channel_count == 0 {
            return Err(AnalysisError::NoChannels);
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in seconds (`frames / sample_rate`)
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Borrow a single channel
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Reduce the buffer to the mono signal selected by `mode`
    pub fn to_mono(&self, mode: ChannelMode) -> Vec<f32> {
        match mode {
            ChannelMode::First => self.channels[0].clone(),
            ChannelMode::Mixdown => {
                let scale = 1.0 / self.channels.len() as f32;
                (0..self.frames())
                    .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_sample_rate() {
        assert_eq!(
            AudioBuffer::mono(0, vec![0.0; 10]),
            Err(AnalysisError::InvalidSampleRate(0))
        );
    }

    #[test]
    fn test_rejects_mismatched_channels() {
        let result = AudioBuffer::new(44100, vec![vec![0.0; 10], vec![0.0; 9]]);
        assert_eq!(
            result,
            Err(AnalysisError::ChannelLengthMismatch {
                channel: 1,
                expected: 10,
                actual: 9
            })
        );
        assert_eq!(
            AudioBuffer::new(44100, Vec::new()),
            Err(AnalysisError::NoChannels)
        );
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::mono(1000, vec![0.0; 2500]).unwrap();
        assert!((buffer.duration_secs() - 2.5).abs() < 1e-9);
        assert_eq!(buffer.frames(), 2500);
    }

    #[test]
    fn test_interleaved_and_mixdown() {
        let buffer = AudioBuffer::from_interleaved(44100, &[1.0, 0.0, 0.5, -0.5], 2).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.channel(0), Some(&[1.0, 0.5][..]));
        assert_eq!(buffer.channel(1), Some(&[0.0, -0.5][..]));

        assert_eq!(buffer.to_mono(ChannelMode::First), vec![1.0, 0.5]);
        assert_eq!(buffer.to_mono(ChannelMode::Mixdown), vec![0.5, 0.0]);
    }

    #[test]
    fn test_channel_mode_parse() {
        assert_eq!(ChannelMode::parse("Mixdown"), Some(ChannelMode::Mixdown));
        assert_eq!(ChannelMode::parse(" first "), Some(ChannelMode::First));
        assert_eq!(ChannelMode::parse("surround"), None);
    }
}
