//! Track analysis facade
//!
//! Runs tempo, key, energy and spectral analysis side by side over one
//! borrowed buffer and assembles the results into [`AudioFeatures`].

use crate::beat::{BeatInfo, BeatTracker};
use crate::buffer::AudioBuffer;
use crate::camelot::camelot_for_label;
use crate::cancel::CancellationToken;
use crate::config::AnalyzerConfig;
use crate::energy::{energy_profile, zero_crossing_rate, EnergyAnalyzer, EnergyProfile};
use crate::error::{validate_input, AnalysisError};
use crate::key::{KeyEstimate, KeyEstimator};
use crate::spectral::{FrequencyBands, SpectralAnalyzer};
use crate::structure::TrackStructure;
use crate::tempo::{TempoEstimate, TempoEstimator};
use serde::{Deserialize, Serialize};
use std::thread;
use tracing::{debug, info};

/// Everything known about a track after one `analyze` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub bpm: f32,
    pub bpm_confidence: f32,
    /// Label such as "C Major"
    pub key: String,
    pub key_confidence: f32,
    /// Camelot notation such as "8B", or "Unknown"
    pub camelot_key: String,
    /// Mean squared amplitude
    pub energy: f32,
    /// dB, floored at -60
    pub loudness: f32,
    pub spectral_centroid: f32,
    pub spectral_rolloff: f32,
    pub spectral_flux: f32,
    pub spectral_bandwidth: f32,
    pub spectral_flatness: f32,
    /// Centroid relative to 10 kHz, 0..=1
    pub brightness: f32,
    /// 1 - brightness
    pub warmth: f32,
    /// Spectral flatness, 0..=1
    pub roughness: f32,
    pub zero_crossing_rate: f32,
    pub rms_energy: f32,
    pub peak_frequency: f32,
    /// dB, capped at 60
    pub dynamic_range: f32,
    /// Seconds
    pub attack_time: f32,
    /// Seconds
    pub decay_time: f32,
    pub duration_secs: f64,
    pub bands: FrequencyBands,
    pub energy_profile: EnergyProfile,
    pub structure: TrackStructure,
}

/// Offline analyzer holding only immutable configuration and tables
#[derive(Debug, Clone)]
pub struct TrackAnalyzer {
    config: AnalyzerConfig,
    tempo: TempoEstimator,
    key: KeyEstimator,
    energy: EnergyAnalyzer,
    spectral: SpectralAnalyzer,
    beats: BeatTracker,
}

impl TrackAnalyzer {
    /// Build the analyzers for a configuration
    ///
    /// Fails with [`AnalysisError::NonPowerOfTwo`] for an unusable fft size.
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            config,
            tempo: TempoEstimator::new(),
            key: KeyEstimator::new()?,
            energy: EnergyAnalyzer::new(),
            spectral: SpectralAnalyzer::new(config.fft_size)?,
            beats: BeatTracker::new(),
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a mono buffer
    pub fn analyze(&self, sample_rate: u32, samples: &[f32]) -> Result<AudioFeatures, AnalysisError> {
        self.analyze_with_cancel(sample_rate, samples, &CancellationToken::new())
    }

    /// Analyze a decoded buffer, reduced to mono per the configured channel mode
    pub fn analyze_buffer(&self, buffer: &AudioBuffer) -> Result<AudioFeatures, AnalysisError> {
        self.analyze_buffer_with_cancel(buffer, &CancellationToken::new())
    }

    pub fn analyze_buffer_with_cancel(
        &self,
        buffer: &AudioBuffer,
        cancel: &CancellationToken,
    ) -> Result<AudioFeatures, AnalysisError> {
        let mono = buffer.to_mono(self.config.channel_mode);
        self.analyze_with_cancel(buffer.sample_rate(), &mono, cancel)
    }

    /// Analyze a mono buffer, stopping early once `cancel` fires
    ///
    /// The four analyses run on scoped threads and are joined before the
    /// record is assembled. Any failure fails the whole call.
    pub fn analyze_with_cancel(
        &self,
        sample_rate: u32,
        samples: &[f32],
        cancel: &CancellationToken,
    ) -> Result<AudioFeatures, AnalysisError> {
        validate_input(sample_rate, samples)?;
        cancel.check()?;

        debug!(sample_rate, samples = samples.len(), "analysis started");

        let (tempo, key, energy, spectral) = thread::scope(|s| {
            let tempo = s.spawn(|| self.tempo.estimate_with_cancel(samples, sample_rate, cancel));
            let key = s.spawn(|| self.key.estimate_with_cancel(samples, sample_rate, cancel));
            let energy = s.spawn(|| self.energy.analyze(samples, sample_rate));
            let spectral =
                s.spawn(|| self.spectral.analyze_with_cancel(samples, sample_rate, cancel));

            (
                join(tempo.join()),
                join(key.join()),
                join(energy.join()),
                join(spectral.join()),
            )
        });
        let (tempo, key, energy, spectral) = (tempo?, key?, energy?, spectral?);
        cancel.check()?;

        let duration_secs = samples.len() as f64 / sample_rate as f64;
        let grid = self.beats.track_from_estimate(&tempo, duration_secs);
        let structure =
            TrackStructure::from_envelope(&energy.envelope, sample_rate, duration_secs, &grid);

        let key_label = key.label();
        let features = AudioFeatures {
            bpm: tempo.bpm,
            bpm_confidence: tempo.confidence.value(),
            camelot_key: camelot_for_label(&key_label),
            key: key_label,
            key_confidence: key.confidence.value(),
            energy: energy.mean_energy,
            loudness: energy.loudness,
            spectral_centroid: spectral.centroid,
            spectral_rolloff: spectral.rolloff,
            spectral_flux: spectral.flux,
            spectral_bandwidth: spectral.bandwidth,
            spectral_flatness: spectral.flatness,
            brightness: spectral.brightness,
            warmth: spectral.warmth,
            roughness: spectral.roughness,
            zero_crossing_rate: zero_crossing_rate(samples),
            rms_energy: energy.rms,
            peak_frequency: spectral.peak_frequency,
            dynamic_range: energy.dynamic_range,
            attack_time: energy.attack_time,
            decay_time: energy.decay_time,
            duration_secs,
            bands: spectral.bands,
            energy_profile: energy_profile(samples),
            structure,
        };

        info!(
            bpm = features.bpm,
            key = %features.key,
            camelot = %features.camelot_key,
            "track analyzed"
        );
        Ok(features)
    }

    /// Tempo of a mono buffer on its own
    pub fn detect_bpm(&self, sample_rate: u32, samples: &[f32]) -> Result<TempoEstimate, AnalysisError> {
        self.tempo.estimate(samples, sample_rate)
    }

    /// Key of a mono buffer on its own
    pub fn detect_key(&self, sample_rate: u32, samples: &[f32]) -> Result<KeyEstimate, AnalysisError> {
        self.key.estimate(samples, sample_rate)
    }

    /// Beat grid spanning the buffer at a known tempo
    pub fn track_beats(&self, buffer: &AudioBuffer, bpm: f32) -> BeatInfo {
        self.beats.track(bpm, buffer.duration_secs())
    }

    /// Beat times in seconds spanning the buffer at a known tempo
    pub fn beat_grid(&self, buffer: &AudioBuffer, bpm: f32) -> Vec<f64> {
        self.track_beats(buffer, bpm).beat_times
    }
}

/// Re-raise a worker panic on the calling thread
fn join<T>(result: thread::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}
