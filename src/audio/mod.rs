//! Audio loading and feature extraction.
//!
//! This module provides:
//! - Audio file decoding via Symphonia
//! - STFT features via RustFFT: RMS energy, spectral centroid, spectral rolloff
//! - Beat detection and tempo estimation
//! - The per-video-frame [`FeatureTrack`] that drives the particle simulation

pub mod features;
pub mod fft;
pub mod loader;
pub mod synth;
pub mod tempo;
pub mod track;

pub use features::{analyze_samples, extract_features, AnalysisConfig, AudioFeatures};
pub use fft::SpectrumAnalyzer;
pub use loader::{load_audio, AudioData, AudioError};
pub use synth::{generate_click_track, generate_sine, generate_test_beat, write_wav};
pub use tempo::{detect_beats, estimate_bpm, BeatInfo};
pub use track::{min_max_normalize, resample, total_frames, FeatureTrack, FrameFeatures};
