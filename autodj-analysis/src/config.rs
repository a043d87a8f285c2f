//! Analyzer configuration
//!
//! Stored as simple `key=value` lines; `#` starts a comment line.

use crate::buffer::ChannelMode;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Frame size of the spectral analyzer when none is configured
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("FFT size must be a power of two >= 2, got {0}")]
    NonPowerOfTwo(usize),
}

/// Settings shared by every analysis of a `TrackAnalyzer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Spectral analyzer frame size; hop is half of it
    pub fft_size: usize,
    /// How multi-channel buffers are reduced to mono
    pub channel_mode: ChannelMode,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            channel_mode: ChannelMode::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())?;
        Ok(())
    }

    /// Parse config from simple key=value format
    ///
    /// Missing keys keep their defaults and unknown keys are ignored.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line, "ignoring config line without '='");
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "fft_size" => {
                    config.fft_size = value.parse().map_err(|_| invalid(key, value))?;
                }
                "channel_mode" => {
                    config.channel_mode =
                        ChannelMode::parse(value).ok_or_else(|| invalid(key, value))?;
                }
                _ => {} // Ignore unknown keys
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to simple key=value format
    pub fn serialize(&self) -> String {
        [
            "# autodj analyzer configuration".to_string(),
            format!("fft_size={}", self.fft_size),
            format!("channel_mode={}", self.channel_mode.as_str()),
        ]
        .join("\n")
    }

    /// Reject settings the analyzers cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(ConfigError::NonPowerOfTwo(self.fft_size));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(AnalyzerConfig::parse("").unwrap(), AnalyzerConfig::default());
    }

    #[test]
    fn test_parse_values() {
        let config = AnalyzerConfig::parse("fft_size=4096\nchannel_mode=mixdown").unwrap();
        assert_eq!(config.fft_size, 4096);
        assert_eq!(config.channel_mode, ChannelMode::Mixdown);
    }

    #[test]
    fn test_parse_with_comments_and_unknown_keys() {
        let content = "# Comment\n fft_size = 1024 \nlast_scan_folder=/music\n# Another comment";
        let config = AnalyzerConfig::parse(content).unwrap();
        assert_eq!(config.fft_size, 1024);
        assert_eq!(config.channel_mode, ChannelMode::First);
    }

    #[test]
    fn test_parse_invalid_values() {
        assert!(matches!(
            AnalyzerConfig::parse("fft_size=big"),
            Err(ConfigError::InvalidValue { key, .. }) if key == "fft_size"
        ));
        assert!(matches!(
            AnalyzerConfig::parse("channel_mode=surround"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AnalyzerConfig::parse("fft_size=1000"),
            Err(ConfigError::NonPowerOfTwo(1000))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(AnalyzerConfig::default().validate().is_ok());
        let config = AnalyzerConfig {
            fft_size: 1,
            ..AnalyzerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NonPowerOfTwo(1))));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = AnalyzerConfig {
            fft_size: 8192,
            channel_mode: ChannelMode::Mixdown,
        };
        let parsed = AnalyzerConfig::parse(&config.serialize()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("autodj-config-{}", std::process::id()))
            .join("analyzer.txt");
        let config = AnalyzerConfig {
            fft_size: 512,
            channel_mode: ChannelMode::First,
        };
        config.save_to(&path).unwrap();
        assert_eq!(AnalyzerConfig::load_from(&path).unwrap(), config);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let result = AnalyzerConfig::load_from(Path::new("/nonexistent/autodj/config.txt"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
