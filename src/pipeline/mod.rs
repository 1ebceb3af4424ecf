//! Full render pipeline combining audio analysis, simulation and video.

pub mod compositor;
pub mod progress;

use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::audio::{extract_features, AnalysisConfig, AudioError, AudioFeatures, FeatureTrack};
use crate::video::{FrameSink, MuxError, VideoAssembly, VideoConfig};

pub use compositor::{spawn_count, FrameCompositor, RenderError};
pub use progress::{progress_channel, CancellationToken, ProgressEvent, ProgressReporter};

/// Pipeline configuration for rendering a particle video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// H.264 CRF (0-51).
    pub crf: u32,
    pub preset: String,
    /// Frames scanned forward when estimating how long a note is held.
    pub note_window: usize,
    /// Frames buffered between rendering and the encoder thread. 0 encodes
    /// on the render thread.
    pub queue_depth: usize,
    /// Particle RNG seed; a random one is drawn and logged when unset.
    pub seed: Option<u64>,
    pub ffmpeg: PathBuf,
    pub analysis: AnalysisConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            crf: 18,
            preset: "medium".to_string(),
            note_window: 10,
            queue_depth: 4,
            seed: None,
            ffmpeg: PathBuf::from("ffmpeg"),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Reject settings the renderer or encoder cannot honour.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::Config(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(PipelineError::Config(format!(
                "dimensions must be even for yuv420p, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(PipelineError::Config("fps must be non-zero".to_string()));
        }
        if self.crf > 51 {
            return Err(PipelineError::Config(format!(
                "crf must be 0-51, got {}",
                self.crf
            )));
        }
        if self.analysis.n_fft == 0 || self.analysis.hop_length == 0 {
            return Err(PipelineError::Config(
                "n_fft and hop_length must be non-zero".to_string(),
            ));
        }
        if !(self.analysis.roll_percent > 0.0 && self.analysis.roll_percent <= 1.0) {
            return Err(PipelineError::Config(format!(
                "roll_percent must be in (0, 1], got {}",
                self.analysis.roll_percent
            )));
        }
        Ok(())
    }

    /// Convert to VideoConfig for encoding.
    pub fn to_video_config(&self) -> VideoConfig {
        VideoConfig {
            width: self.width,
            height: self.height,
            fps: self.fps,
            crf: self.crf,
            preset: self.preset.clone(),
            ffmpeg: self.ffmpeg.clone(),
        }
    }

    fn compositor(&self) -> Result<FrameCompositor, RenderError> {
        let seed = self.seed.unwrap_or_else(rand::random);
        log::info!("Particle seed: {}", seed);
        FrameCompositor::new(self.width, self.height, self.fps, self.note_window, seed)
    }
}

/// Errors that can occur during pipeline execution.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(#[from] AudioError),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Mux failed: {0}")]
    Mux(#[from] MuxError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Generation cancelled")]
    Cancelled,
}

/// Short description of an analysed track.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub duration: f64,
    pub sample_rate: u32,
    pub tempo: f32,
    pub beat_times: Vec<f64>,
    pub analysis_frames: usize,
    pub video_frames: usize,
    pub fps: u32,
}

impl AnalysisSummary {
    pub fn new(features: &AudioFeatures, fps: u32) -> Self {
        Self {
            duration: features.duration,
            sample_rate: features.sample_rate,
            tempo: features.tempo,
            beat_times: features.beats.iter().map(|b| b.time).collect(),
            analysis_frames: features.num_frames(),
            video_frames: crate::audio::total_frames(features.duration, fps),
            fps,
        }
    }
}

/// Analyze audio file and return its features.
pub fn analyze_audio_file<P: AsRef<Path>>(
    audio_path: P,
    config: &AnalysisConfig,
) -> Result<AudioFeatures, PipelineError> {
    Ok(extract_features(audio_path.as_ref(), config)?)
}

fn load_track(audio_path: &Path, config: &PipelineConfig) -> Result<FeatureTrack, PipelineError> {
    let features = extract_features(audio_path, &config.analysis)?;
    let track = FeatureTrack::from_features(&features, config.fps);
    if track.is_empty() {
        return Err(RenderError::EmptyTrack.into());
    }
    log::info!(
        "Feature track: {} frames at {} fps ({:.2}s)",
        track.len(),
        config.fps,
        track.duration()
    );
    Ok(track)
}

/// Render every frame of `track` into `sink`, then finish the sink.
///
/// Checks `cancel` before each frame and reports progress after each one,
/// scaled into the reporter's current range. Returns the frame count.
pub fn render_frames(
    track: &FeatureTrack,
    compositor: &mut FrameCompositor,
    sink: &mut dyn FrameSink,
    reporter: &mut ProgressReporter,
    cancel: &CancellationToken,
) -> Result<usize, PipelineError> {
    if track.is_empty() {
        return Err(RenderError::EmptyTrack.into());
    }

    let total = track.len();
    for index in 0..total {
        if cancel.is_cancelled() {
            log::info!("Cancelled at frame {}/{}", index, total);
            return Err(PipelineError::Cancelled);
        }

        let frame = compositor.render_frame(track, index)?;
        sink.write_frame(frame).map_err(RenderError::from)?;

        let done = index + 1;
        reporter.report_fraction(done as f64 / total as f64, |percent| {
            format!("Generating video: {}%", percent)
        });
        if done % 100 == 0 {
            log::debug!(
                "Rendered {}/{} frames, {} live particles",
                done,
                total,
                compositor.system().len()
            );
        }
    }

    sink.finish().map_err(RenderError::from)?;
    Ok(total)
}

fn open_encoder(path: &Path, config: &PipelineConfig) -> Result<Box<dyn FrameSink>, RenderError> {
    let video_config = config.to_video_config();

    #[cfg(feature = "native-encoder")]
    {
        Ok(Box::new(crate::video::NativeEncoder::new(path, video_config)?))
    }

    #[cfg(not(feature = "native-encoder"))]
    {
        let encoder = crate::video::FfmpegProcessEncoder::new(path, video_config)?;
        if config.queue_depth == 0 {
            Ok(Box::new(encoder))
        } else {
            Ok(Box::new(crate::video::ThreadedSink::spawn(
                encoder,
                config.queue_depth,
            )?))
        }
    }
}

/// Render a particle video for `audio_path` to `output_path`.
///
/// Stages report 0 (audio), 20 (video start), 20-90 (frames), 90 (mux) and
/// 100 (done). Audio is analysed before anything is written to disk; on any
/// later failure the temporary files and any partial output are removed.
pub fn render_video<P: AsRef<Path>, Q: AsRef<Path>>(
    audio_path: P,
    output_path: Q,
    config: &PipelineConfig,
    mut reporter: ProgressReporter,
    cancel: &CancellationToken,
) -> Result<PathBuf, PipelineError> {
    let audio_path = audio_path.as_ref();
    let output_path = output_path.as_ref();
    config.validate()?;

    reporter.report(0, "Processing audio...");
    let track = load_track(audio_path, config)?;

    reporter.report(20, "Starting video generation...");
    let assembly = VideoAssembly::new(output_path, &config.ffmpeg)?;
    let mut compositor = config.compositor()?;
    let mut encoder = open_encoder(&assembly.video_path(), config)?;

    reporter.set_range(20, 90);
    render_frames(
        &track,
        &mut compositor,
        encoder.as_mut(),
        &mut reporter,
        cancel,
    )?;
    drop(encoder);

    reporter.set_range(0, 100);
    reporter.report(90, "Combining video with audio...");
    assembly.extract_audio(audio_path)?;
    let output = assembly.mux()?;

    reporter.report(100, "Video complete!");
    Ok(output)
}

/// Render frames `0..=frame` in memory and return the last one.
pub fn render_preview<P: AsRef<Path>>(
    audio_path: P,
    config: &PipelineConfig,
    frame: usize,
) -> Result<RgbImage, PipelineError> {
    config.validate()?;
    let track = load_track(audio_path.as_ref(), config)?;
    if frame >= track.len() {
        return Err(RenderError::FrameOutOfRange {
            index: frame,
            len: track.len(),
        }
        .into());
    }

    let mut compositor = config.compositor()?;
    let mut last = None;
    for index in 0..=frame {
        last = Some(compositor.render_frame(&track, index)?);
    }
    last.ok_or_else(|| RenderError::EmptyTrack.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::MemorySink;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.fps, 30);
        assert_eq!(config.note_window, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_odd_and_zero() {
        let odd = PipelineConfig {
            width: 641,
            ..PipelineConfig::default()
        };
        assert!(matches!(odd.validate(), Err(PipelineError::Config(_))));

        let zero_fps = PipelineConfig {
            fps: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(zero_fps.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_config_from_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "width": 640, "height": 360, "seed": 5 }"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 360);
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.fps, 30);
        assert_eq!(config.analysis.n_fft, 2048);
    }

    #[test]
    fn test_config_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ width: }").unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_frame_messages_show_overall_percent() {
        let raw = vec![0.2, 0.8];
        let track = FeatureTrack::build(&raw, &raw, &raw, 2.0 / 30.0, 2);
        let mut compositor = FrameCompositor::new(32, 32, 30, 10, 1).unwrap();
        let (mut reporter, rx) = progress_channel();
        reporter.set_range(20, 90);

        render_frames(
            &track,
            &mut compositor,
            &mut MemorySink::new(),
            &mut reporter,
            &CancellationToken::new(),
        )
        .unwrap();

        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].percent, 55);
        assert_eq!(events[0].message, "Generating video: 55%");
        assert_eq!(events[1].message, "Generating video: 90%");
    }

    #[test]
    fn test_render_frames_honours_cancellation() {
        let raw = vec![0.1, 0.5, 0.9];
        let track = FeatureTrack::build(&raw, &raw, &raw, 0.1, 3);
        let mut compositor = FrameCompositor::new(32, 32, 30, 10, 1).unwrap();
        let mut sink = MemorySink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = render_frames(
            &track,
            &mut compositor,
            &mut sink,
            &mut ProgressReporter::silent(),
            &cancel,
        );
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(sink.frames().is_empty());
    }
}
