//! Offline track analysis for autodj
//!
//! Derives tempo, musical key (with Camelot notation), loudness and energy
//! statistics, spectral descriptors, a beat grid and intro/outro mix points
//! from decoded PCM, and suggests transitions between analyzed tracks.

mod analyzer;
mod beat;
mod buffer;
mod camelot;
mod cancel;
mod confidence;
mod config;
mod energy;
mod error;
mod fft;
mod key;
mod spectral;
mod structure;
mod tempo;
mod transition;
mod window;

pub use analyzer::{AudioFeatures, TrackAnalyzer};
pub use beat::{BeatInfo, BeatTracker, BEATS_PER_BAR};
pub use buffer::{AudioBuffer, ChannelMode};
pub use camelot::{camelot_for_label, CamelotKey, MusicalKey, NOTE_NAMES, UNKNOWN_CAMELOT};
pub use cancel::CancellationToken;
pub use confidence::Confidence;
pub use config::{AnalyzerConfig, ConfigError, DEFAULT_FFT_SIZE};
pub use energy::{
    energy_profile, zero_crossing_rate, EnergyAnalyzer, EnergyInfo, EnergyProfile,
    ENERGY_FRAME_SIZE,
};
pub use error::{AnalysisError, EPSILON};
pub use fft::{autocorrelation, magnitude_spectrum, Fft};
pub use key::{KeyEstimate, KeyEstimator};
pub use spectral::{FrequencyBand, FrequencyBands, SpectralAnalyzer, SpectralInfo, MFCC_COEFFICIENTS};
pub use structure::{IntroInfo, OutroInfo, TrackStructure};
pub use tempo::{TempoEstimate, TempoEstimator, MAX_BPM, MIN_BPM};
pub use transition::{suggest_transition, TransitionKind, TransitionSuggestion};
pub use window::{apply_hann, frames, hann_window};
