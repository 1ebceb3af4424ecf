//! Feature track: audio features resampled onto the video frame grid.
//!
//! Output frame `i` corresponds to audio time `i * duration / total_frames`.
//! Every sequence is min-max normalized to [0, 1].

use serde::Serialize;

use super::features::AudioFeatures;

/// Added to the normalization range so constant input maps to 0 instead of
/// dividing by zero.
const NORMALIZE_EPSILON: f32 = 1e-6;

/// Fraction of the current frame's RMS a following frame must keep to count
/// as the same note.
const NOTE_SUSTAIN_RATIO: f32 = 0.7;

/// Normalized features for one video frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameFeatures {
    /// Normalized RMS energy.
    pub intensity: f32,
    /// Normalized spectral centroid.
    pub frequency: f32,
    /// Normalized spectral rolloff.
    pub energy: f32,
}

/// Per-video-frame intensity, frequency and energy, each in [0, 1].
#[derive(Debug, Clone, Serialize)]
pub struct FeatureTrack {
    intensity: Vec<f32>,
    frequency: Vec<f32>,
    energy: Vec<f32>,
    duration: f64,
}

impl FeatureTrack {
    /// Resample and normalize raw feature arrays onto `total_frames` frames
    /// spanning `[0, duration)`.
    pub fn build(
        rms: &[f32],
        spectral_centroid: &[f32],
        spectral_rolloff: &[f32],
        duration: f64,
        total_frames: usize,
    ) -> Self {
        Self {
            intensity: min_max_normalize(resample(rms, duration, total_frames)),
            frequency: min_max_normalize(resample(spectral_centroid, duration, total_frames)),
            energy: min_max_normalize(resample(spectral_rolloff, duration, total_frames)),
            duration,
        }
    }

    /// Build the track for a video at `fps` frames per second, with
    /// `round(duration * fps)` frames.
    pub fn from_features(features: &AudioFeatures, fps: u32) -> Self {
        let total_frames = total_frames(features.duration, fps);
        Self::build(
            &features.rms,
            &features.spectral_centroid,
            &features.spectral_rolloff,
            features.duration,
            total_frames,
        )
    }

    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    /// Audio duration the track spans, in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Audio time of a frame in seconds.
    pub fn frame_time(&self, index: usize) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        index as f64 * self.duration / self.len() as f64
    }

    /// Features of one frame, `None` past the end.
    pub fn frame(&self, index: usize) -> Option<FrameFeatures> {
        Some(FrameFeatures {
            intensity: *self.intensity.get(index)?,
            frequency: *self.frequency.get(index)?,
            energy: *self.energy.get(index)?,
        })
    }

    pub fn intensity(&self) -> &[f32] {
        &self.intensity
    }

    pub fn frequency(&self) -> &[f32] {
        &self.frequency
    }

    pub fn energy(&self) -> &[f32] {
        &self.energy
    }

    /// Estimate how long the note sounding at `index` lasts, in seconds.
    ///
    /// Counts frames from `index` forward, at most `window` of them, while the
    /// intensity stays at or above 70% of the intensity at `index`. Stops at the
    /// first frame that drops below.
    pub fn note_duration(&self, index: usize, window: usize, fps: u32) -> f32 {
        if index >= self.len() || fps == 0 {
            return 0.0;
        }

        let threshold = self.intensity[index] * NOTE_SUSTAIN_RATIO;
        let end = (index + window).min(self.len());
        let sustained = self.intensity[index..end]
            .iter()
            .take_while(|&&v| v >= threshold)
            .count();

        sustained as f32 / fps as f32
    }
}

/// Number of video frames for `duration` seconds at `fps`.
pub fn total_frames(duration: f64, fps: u32) -> usize {
    (duration * fps as f64).round().max(0.0) as usize
}

/// Linearly resample `raw` onto `total_frames` uniform timestamps.
///
/// Raw value `j` sits at `j * duration / raw.len()`; output frame `i` at
/// `i * duration / total_frames`. Times outside the raw grid take the nearest
/// end value. Empty input resamples to zeros.
pub fn resample(raw: &[f32], duration: f64, total_frames: usize) -> Vec<f32> {
    if raw.is_empty() {
        return vec![0.0; total_frames];
    }
    if raw.len() == 1 || duration <= 0.0 {
        return vec![raw[0]; total_frames];
    }

    let raw_step = duration / raw.len() as f64;
    let frame_step = duration / total_frames.max(1) as f64;
    let last = raw.len() - 1;

    (0..total_frames)
        .map(|i| {
            let position = (i as f64 * frame_step) / raw_step;
            if position <= 0.0 {
                return raw[0];
            }
            let lower = position.floor() as usize;
            if lower >= last {
                return raw[last];
            }
            let frac = (position - lower as f64) as f32;
            raw[lower] + (raw[lower + 1] - raw[lower]) * frac
        })
        .collect()
}

/// Scale values to [0, 1] using `(v - min) / (max - min + 1e-6)`.
pub fn min_max_normalize(mut values: Vec<f32>) -> Vec<f32> {
    if values.is_empty() {
        return values;
    }

    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min + NORMALIZE_EPSILON;

    for v in &mut values {
        *v = (*v - min) / range;
    }
    values
}
