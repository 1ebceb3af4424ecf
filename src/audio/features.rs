//! Frame-level audio features: RMS energy, spectral centroid, spectral
//! rolloff, plus tempo.
//!
//! Framing matches the common librosa defaults: 2048-sample frames every 512
//! samples, centred on the hop position with zero padding, giving
//! `1 + len / hop` frames.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::fft::SpectrumAnalyzer;
use super::loader::{load_audio, AudioError};
use super::tempo::{detect_beats, estimate_bpm, BeatInfo};

/// Beat detection sensitivity used for the tempo estimate.
const TEMPO_SENSITIVITY: f32 = 0.5;

/// STFT parameters for feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Frame length in samples.
    pub n_fft: usize,
    /// Distance between frame centres in samples.
    pub hop_length: usize,
    /// Fraction of spectral magnitude below the rolloff frequency.
    pub roll_percent: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            roll_percent: 0.85,
        }
    }
}

/// Raw (unnormalized) per-analysis-frame features of one audio file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Duration in seconds.
    pub duration: f64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Hop between analysis frames in samples.
    pub hop_length: usize,
    /// Estimated tempo in BPM (0 when unknown).
    pub tempo: f32,
    /// Detected beats.
    pub beats: Vec<BeatInfo>,
    /// RMS energy per analysis frame.
    pub rms: Vec<f32>,
    /// Spectral centroid in Hz per analysis frame.
    pub spectral_centroid: Vec<f32>,
    /// Spectral rolloff in Hz per analysis frame.
    pub spectral_rolloff: Vec<f32>,
}

impl AudioFeatures {
    /// Number of analysis frames.
    pub fn num_frames(&self) -> usize {
        self.rms.len()
    }
}

/// RMS of a block of samples.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Magnitude-weighted mean frequency of a spectrum, 0 for silence.
pub fn spectral_centroid(magnitudes: &[f32], bin_hz: f32) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= f32::EPSILON {
        return 0.0;
    }
    let weighted: f32 = magnitudes
        .iter()
        .enumerate()
        .map(|(k, &m)| k as f32 * bin_hz * m)
        .sum();
    weighted / total
}

/// Lowest frequency below which `roll_percent` of the magnitude lies.
pub fn spectral_rolloff(magnitudes: &[f32], bin_hz: f32, roll_percent: f32) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    let threshold = roll_percent * total;

    let mut cumulative = 0.0;
    for (k, &m) in magnitudes.iter().enumerate() {
        cumulative += m;
        if cumulative >= threshold {
            return k as f32 * bin_hz;
        }
    }
    magnitudes.len().saturating_sub(1) as f32 * bin_hz
}

/// Extract features from mono samples.
pub fn analyze_samples(samples: &[f32], sample_rate: u32, config: &AnalysisConfig) -> AudioFeatures {
    let n_fft = config.n_fft.max(2);
    let hop = config.hop_length.max(1);
    let pad = n_fft / 2;
    let num_frames = 1 + samples.len() / hop;

    // Centred frames: zero padding on both sides.
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let mut analyzer = SpectrumAnalyzer::new(n_fft);
    let bin_hz = analyzer.bin_to_freq(1, sample_rate);

    let mut rms = Vec::with_capacity(num_frames);
    let mut spectral_centroid_track = Vec::with_capacity(num_frames);
    let mut spectral_rolloff_track = Vec::with_capacity(num_frames);

    for i in 0..num_frames {
        let start = i * hop;
        let end = (start + n_fft).min(padded.len());
        let frame = &padded[start..end];

        rms.push(calculate_rms(frame));

        let magnitudes = analyzer.analyze(frame);
        spectral_centroid_track.push(spectral_centroid(&magnitudes, bin_hz));
        spectral_rolloff_track.push(spectral_rolloff(&magnitudes, bin_hz, config.roll_percent));
    }

    let beats = detect_beats(samples, sample_rate, TEMPO_SENSITIVITY);
    let tempo = estimate_bpm(&beats);

    AudioFeatures {
        duration: samples.len() as f64 / sample_rate.max(1) as f64,
        sample_rate,
        hop_length: hop,
        tempo,
        beats,
        rms,
        spectral_centroid: spectral_centroid_track,
        spectral_rolloff: spectral_rolloff_track,
    }
}

/// Decode an audio file and extract its features.
pub fn extract_features(path: &Path, config: &AnalysisConfig) -> Result<AudioFeatures, AudioError> {
    let audio = load_audio(path)?;
    let mono = audio.to_mono();
    let features = analyze_samples(&mono, audio.sample_rate, config);

    log::info!(
        "Analyzed {}: {:.2}s, {} analysis frames, tempo {:.1} BPM",
        path.display(),
        features.duration,
        features.num_frames(),
        features.tempo
    );

    Ok(features)
}
