//! Beat detection and tempo estimation.
//!
//! Energy-based onset detection in the bass band, followed by a median
//! inter-beat interval. Good enough to label a track's tempo; the particle
//! simulation itself never looks at beats.

use serde::{Deserialize, Serialize};

use super::fft::SpectrumAnalyzer;

const ONSET_FFT_SIZE: usize = 1024;
const ONSET_HOP: usize = 512;
const BASS_LOW_HZ: f32 = 20.0;
const BASS_HIGH_HZ: f32 = 200.0;
/// Windows on each side of the local-average context (~100ms at 44.1kHz).
const LOCAL_AVG_WINDOWS: usize = 8;
const MIN_BEAT_SPACING_SECS: f32 = 0.2;

/// A detected beat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatInfo {
    /// Time of the beat in seconds.
    pub time: f64,
    /// Strength of the onset (0.0 to 1.0).
    pub strength: f32,
}

/// Detect beats in mono samples.
///
/// `sensitivity` is how far above the local average the bass energy must
/// rise: 0.5 means 50% above.
pub fn detect_beats(samples: &[f32], sample_rate: u32, sensitivity: f32) -> Vec<BeatInfo> {
    if samples.len() < ONSET_FFT_SIZE || sample_rate == 0 {
        return Vec::new();
    }

    let mut analyzer = SpectrumAnalyzer::new(ONSET_FFT_SIZE);
    let num_windows = (samples.len() - ONSET_FFT_SIZE) / ONSET_HOP + 1;

    let low_bin = analyzer.freq_to_bin(BASS_LOW_HZ, sample_rate);
    let high_bin = analyzer.freq_to_bin(BASS_HIGH_HZ, sample_rate).max(low_bin + 1);

    let mut bass_energy: Vec<f32> = (0..num_windows)
        .map(|i| {
            let start = i * ONSET_HOP;
            let spectrum = analyzer.analyze(&samples[start..start + ONSET_FFT_SIZE]);
            let high = high_bin.min(spectrum.len());
            spectrum[low_bin.min(high)..high].iter().map(|&m| m * m).sum()
        })
        .collect();

    let max_energy = bass_energy.iter().copied().fold(0.0f32, f32::max);
    if max_energy <= 0.0 {
        return Vec::new();
    }
    for e in &mut bass_energy {
        *e /= max_energy;
    }

    let local_avg: Vec<f32> = (0..bass_energy.len())
        .map(|i| {
            let start = i.saturating_sub(LOCAL_AVG_WINDOWS);
            let end = (i + LOCAL_AVG_WINDOWS + 1).min(bass_energy.len());
            bass_energy[start..end].iter().sum::<f32>() / (end - start) as f32
        })
        .collect();

    let threshold = 1.0 + sensitivity;
    let min_spacing =
        ((sample_rate as f32 / ONSET_HOP as f32) * MIN_BEAT_SPACING_SECS) as usize;

    let mut beats = Vec::new();
    let mut last_beat: Option<usize> = None;

    for i in 1..bass_energy.len().saturating_sub(1) {
        let is_peak = bass_energy[i] > bass_energy[i - 1] && bass_energy[i] > bass_energy[i + 1];
        let loud_enough = bass_energy[i] > local_avg[i] * threshold;
        let spaced = last_beat.map_or(true, |lb| i - lb >= min_spacing);

        if is_peak && loud_enough && spaced {
            beats.push(BeatInfo {
                time: (i * ONSET_HOP) as f64 / sample_rate as f64,
                strength: (bass_energy[i] / local_avg[i].max(0.01) - 1.0).min(1.0),
            });
            last_beat = Some(i);
        }
    }

    beats
}

/// Estimate tempo in BPM from detected beats, 0.0 when there is too little
/// evidence.
///
/// Uses the median of plausible intervals (0.2s - 2s) and folds the result
/// by an octave into 60-200 BPM.
pub fn estimate_bpm(beats: &[BeatInfo]) -> f32 {
    let mut intervals: Vec<f64> = beats
        .windows(2)
        .map(|w| w[1].time - w[0].time)
        .filter(|&i| i > 0.2 && i < 2.0)
        .collect();

    if intervals.is_empty() {
        return 0.0;
    }

    intervals.sort_by(|a, b| a.total_cmp(b));
    let bpm = 60.0 / intervals[intervals.len() / 2];

    if bpm < 60.0 {
        (bpm * 2.0) as f32
    } else if bpm > 200.0 {
        (bpm / 2.0) as f32
    } else {
        bpm as f32
    }
}
