//! Magnitude spectrum using RustFFT.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Hann-windowed magnitude spectrum analyzer.
///
/// The window is periodic (the `fftbins=True` form), which is what STFT-based
/// feature extractors use.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for frames of `fft_size` samples.
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let t = i as f32 / fft_size as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
            })
            .collect();

        Self {
            fft: FftPlanner::new().plan_fft_forward(fft_size),
            fft_size,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of non-negative frequency bins, DC through Nyquist.
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Magnitude spectrum of the first `fft_size` samples.
    ///
    /// Shorter input is zero-padded. Returns [`num_bins`](Self::num_bins) values.
    pub fn analyze(&mut self, samples: &[f32]) -> Vec<f32> {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let s = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(s * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        self.buffer[..self.num_bins()]
            .iter()
            .map(|c| c.norm())
            .collect()
    }

    /// Frequency in Hz of a bin.
    pub fn bin_to_freq(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.fft_size as f32
    }

    /// Nearest bin for a frequency in Hz.
    pub fn freq_to_bin(&self, freq: f32, sample_rate: u32) -> usize {
        (freq * self.fft_size as f32 / sample_rate as f32).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_num_bins_includes_nyquist() {
        let analyzer = SpectrumAnalyzer::new(1024);
        assert_eq!(analyzer.fft_size(), 1024);
        assert_eq!(analyzer.num_bins(), 513);
    }

    #[test]
    fn test_sine_wave_peak() {
        let sample_rate = 44100;
        let mut analyzer = SpectrumAnalyzer::new(2048);
        let spectrum = analyzer.analyze(&sine(440.0, sample_rate, 2048));

        let peak_bin = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();

        let peak_freq = analyzer.bin_to_freq(peak_bin, sample_rate);
        assert!((peak_freq - 440.0).abs() < 30.0, "peak at {} Hz", peak_freq);
    }

    #[test]
    fn test_short_input_is_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::new(512);
        let spectrum = analyzer.analyze(&[1.0; 10]);
        assert_eq!(spectrum.len(), 257);
        assert!(spectrum.iter().all(|m| m.is_finite()));
    }

    #[test]
    fn test_bin_freq_conversion() {
        let analyzer = SpectrumAnalyzer::new(2048);
        assert_eq!(analyzer.freq_to_bin(22050.0, 44100), 1024);
        let bin = analyzer.freq_to_bin(1000.0, 44100);
        assert!((analyzer.bin_to_freq(bin, 44100) - 1000.0).abs() < 25.0);
    }
}
