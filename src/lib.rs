//! Particle Visualizer
//!
//! Turns an audio track into a music-reactive particle video.
//!
//! # Features
//!
//! - Audio loading (WAV, MP3, FLAC, AAC) via Symphonia
//! - STFT features via RustFFT: RMS energy, spectral centroid and rolloff, tempo
//! - Seeded particle simulation driven frame by frame by those features
//! - CPU rendering of circles, squares, triangles and stars with glow and trails
//! - H.264 encoding and audio muxing via FFmpeg
//! - Python bindings via PyO3 (when `python` feature is enabled)

pub mod audio;
pub mod particles;
pub mod pipeline;
pub mod render;
pub mod video;

// Re-export commonly used types
pub use audio::{
    extract_features, load_audio, AnalysisConfig, AudioData, AudioError, AudioFeatures,
    FeatureTrack, FrameFeatures,
};
pub use particles::{Particle, ParticleSystem, ShapeKind, TrailPoint};
pub use pipeline::{
    analyze_audio_file, progress_channel, render_frames, render_preview, render_video,
    AnalysisSummary, CancellationToken, FrameCompositor, PipelineConfig, PipelineError,
    ProgressEvent, ProgressReporter, RenderError,
};
pub use render::{GlowCache, Shape};
pub use video::{
    derive_output_path, FrameSink, MemorySink, MuxError, VideoAssembly, VideoConfig, VideoError,
};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
#[allow(deprecated)] // PyO3 0.27 deprecations - APIs still functional
mod python_bindings {
    use crate::pipeline::{self, AnalysisSummary, PipelineConfig, ProgressReporter};
    use pyo3::exceptions::PyRuntimeError;
    use pyo3::prelude::*;
    use pyo3::types::PyAny;
    use std::sync::{Arc, Mutex};

    /// Analyze audio file and return a JSON summary.
    #[pyfunction]
    #[pyo3(signature = (audio_path, fps=30))]
    fn analyze_audio(audio_path: &str, fps: u32) -> PyResult<String> {
        let features = pipeline::analyze_audio_file(audio_path, &Default::default())
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        serde_json::to_string_pretty(&AnalysisSummary::new(&features, fps))
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Render a particle video from an audio file.
    #[pyfunction]
    #[pyo3(signature = (audio_path, output_path, width=1920, height=1080, fps=30, crf=18, seed=None, progress_callback=None))]
    fn render_video(
        py: Python<'_>,
        audio_path: &str,
        output_path: &str,
        width: u32,
        height: u32,
        fps: u32,
        crf: u32,
        seed: Option<u64>,
        progress_callback: Option<Py<PyAny>>,
    ) -> PyResult<String> {
        let config = PipelineConfig {
            width,
            height,
            fps,
            crf,
            seed,
            ..PipelineConfig::default()
        };

        let reporter = match progress_callback {
            Some(cb) => {
                let cb = Arc::new(Mutex::new(cb));
                ProgressReporter::new(move |event| {
                    Python::with_gil(|py| {
                        if let Ok(cb) = cb.lock() {
                            let _ = cb.call1(py, (event.percent, event.message));
                        }
                    });
                })
            }
            None => ProgressReporter::silent(),
        };

        let audio = audio_path.to_string();
        let output = output_path.to_string();
        let cancel = pipeline::CancellationToken::new();

        let result =
            py.allow_threads(|| pipeline::render_video(&audio, &output, &config, reporter, &cancel));

        result
            .map(|path| path.display().to_string())
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Generate a test beat pattern and save to WAV file.
    #[pyfunction]
    #[pyo3(signature = (output_path, bpm=120.0, duration=5.0, sample_rate=44100))]
    fn generate_test_beat(
        output_path: &str,
        bpm: f32,
        duration: f32,
        sample_rate: u32,
    ) -> PyResult<()> {
        use crate::audio::synth;

        let samples = synth::generate_test_beat(bpm, sample_rate, duration);
        synth::write_wav(std::path::Path::new(output_path), &samples, sample_rate)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Particle Visualizer Python module
    #[pymodule]
    pub fn particle_visualizer(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add("__version__", env!("CARGO_PKG_VERSION"))?;
        m.add_function(wrap_pyfunction!(analyze_audio, m)?)?;
        m.add_function(wrap_pyfunction!(render_video, m)?)?;
        m.add_function(wrap_pyfunction!(generate_test_beat, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python_bindings::*;
