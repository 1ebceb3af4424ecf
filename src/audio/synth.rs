//! Synthetic audio for tests, benches and the `synth` command.

use std::f32::consts::PI;
use std::path::Path;

/// Sine wave of `duration` seconds.
pub fn generate_sine(frequency: f32, sample_rate: u32, duration: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (duration * sample_rate as f32) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * PI * frequency * t).sin()
        })
        .collect()
}

/// Metronome: 10ms decaying sine clicks at `bpm`.
pub fn generate_click_track(bpm: f32, sample_rate: u32, duration: f32, click_freq: f32) -> Vec<f32> {
    let num_samples = (duration * sample_rate as f32) as usize;
    let samples_per_beat = ((60.0 / bpm * sample_rate as f32) as usize).max(1);
    let click_samples = (sample_rate as f32 * 0.01) as usize;

    let mut samples = vec![0.0; num_samples];

    for pos in (0..num_samples).step_by(samples_per_beat) {
        for i in 0..click_samples.min(num_samples - pos) {
            let t = i as f32 / sample_rate as f32;
            let envelope = (1.0 - i as f32 / click_samples as f32).powi(2);
            samples[pos + i] = envelope * (2.0 * PI * click_freq * t).sin();
        }
    }

    samples
}

/// A 150ms bass drum hit with a falling pitch.
pub fn generate_kick(sample_rate: u32) -> Vec<f32> {
    let num_samples = (0.15 * sample_rate as f32) as usize;

    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let freq = 50.0 + 100.0 * (-t * 30.0).exp();
            let amp = (-t * 15.0).exp();
            amp * (2.0 * PI * freq * t).sin()
        })
        .collect()
}

/// 4/4 pattern: kicks on 1 and 3, hi-hats on every eighth note, peak
/// normalized to at most 1.0.
pub fn generate_test_beat(bpm: f32, sample_rate: u32, duration: f32) -> Vec<f32> {
    let num_samples = (duration * sample_rate as f32) as usize;
    let samples_per_16th = (((60.0 / bpm * sample_rate as f32) as usize) / 4).max(1);

    let kick = generate_kick(sample_rate);
    let hihat_samples = (sample_rate as f32 * 0.05) as usize;

    let mut samples = vec![0.0; num_samples];

    for (step, pos) in (0..num_samples).step_by(samples_per_16th).enumerate() {
        if step % 8 == 0 || step % 8 == 4 {
            for (i, &sample) in kick.iter().enumerate() {
                if pos + i < num_samples {
                    samples[pos + i] += sample * 0.8;
                }
            }
        }

        if step % 2 == 0 {
            for i in 0..hihat_samples.min(num_samples - pos) {
                let t = i as f32 / sample_rate as f32;
                let amp = (-t * 50.0).exp() * 0.3;
                let noise = ((pos + i) as f32 * 12345.67).sin();
                samples[pos + i] += amp * noise;
            }
        }
    }

    let max_val = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if max_val > 1.0 {
        for s in &mut samples {
            *s /= max_val;
        }
    }

    samples
}

/// Write mono samples as a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()
}
