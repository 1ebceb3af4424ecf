//! Frame sinks: where rendered frames go.
//!
//! The default encoder pipes raw RGB frames into an `ffmpeg` child process
//! that writes a video-only H.264 file. [`ThreadedSink`] moves any sink onto
//! a writer thread behind a bounded queue so encoding overlaps rendering.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use image::RgbImage;

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Frame rate (frames per second).
    pub fps: u32,
    /// CRF quality (0-51, lower is better).
    pub crf: u32,
    /// x264 speed preset.
    pub preset: String,
    /// ffmpeg executable, looked up on `PATH` when not absolute.
    pub ffmpeg: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            crf: 18,
            preset: "medium".to_string(),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

/// Errors that can occur during video encoding.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("Failed to start ffmpeg ({binary}): {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Encoder IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Frame is {actual:?}, encoder expects {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Encoder already finished")]
    Finished,
    #[error("Encoder thread stopped unexpectedly")]
    WorkerStopped,
    #[cfg(feature = "native-encoder")]
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] rsmpeg::error::RsmpegError),
    #[cfg(feature = "native-encoder")]
    #[error("Codec not found: {0}")]
    CodecNotFound(String),
    #[cfg(feature = "native-encoder")]
    #[error("Failed to open output file: {0}")]
    FileOpen(String),
}

/// Consumer of rendered frames, in presentation order.
pub trait FrameSink {
    /// Accept the next frame.
    fn write_frame(&mut self, frame: RgbImage) -> Result<(), VideoError>;

    /// Flush and close. Further writes fail with [`VideoError::Finished`].
    fn finish(&mut self) -> Result<(), VideoError>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_frame(&mut self, frame: RgbImage) -> Result<(), VideoError> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self) -> Result<(), VideoError> {
        (**self).finish()
    }
}

fn check_dimensions(config: &VideoConfig, frame: &RgbImage) -> Result<(), VideoError> {
    let expected = (config.width, config.height);
    if frame.dimensions() != expected {
        return Err(VideoError::FrameSize {
            expected,
            actual: frame.dimensions(),
        });
    }
    Ok(())
}

/// H.264 encoder backed by an `ffmpeg` child process.
///
/// Frames go to ffmpeg's stdin as `rgb24`; the output has no audio track.
pub struct FfmpegProcessEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    config: VideoConfig,
    path: PathBuf,
    frames_written: u64,
}

impl FfmpegProcessEncoder {
    /// Start ffmpeg writing to `path`.
    pub fn new<P: AsRef<Path>>(path: P, config: VideoConfig) -> Result<Self, VideoError> {
        let path = path.as_ref().to_path_buf();

        let mut command = Command::new(&config.ffmpeg);
        command
            .args(["-y", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", config.width, config.height)])
            .args(["-r", &config.fps.to_string()])
            .args(["-i", "-", "-an"])
            .args(["-c:v", "libx264"])
            .args(["-preset", &config.preset])
            .args(["-crf", &config.crf.to_string()])
            .args(["-pix_fmt", "yuv420p"])
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        log::debug!("Spawning encoder: {:?}", command);

        let mut child = command.spawn().map_err(|source| VideoError::Spawn {
            binary: config.ffmpeg.display().to_string(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        Ok(Self {
            child,
            stdin,
            stderr,
            config,
            path,
            frames_written: 0,
        })
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Close stdin, wait for ffmpeg and turn a failed exit into an error
    /// carrying its stderr.
    fn wait(&mut self) -> Result<(), VideoError> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(VideoError::Encoding(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegProcessEncoder {
    fn write_frame(&mut self, frame: RgbImage) -> Result<(), VideoError> {
        check_dimensions(&self.config, &frame)?;
        let stdin = self.stdin.as_mut().ok_or(VideoError::Finished)?;

        if let Err(e) = stdin.write_all(frame.as_raw()) {
            // A broken pipe means ffmpeg died; its stderr says why.
            self.wait()?;
            return Err(e.into());
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), VideoError> {
        if self.stdin.is_none() {
            return Ok(());
        }
        self.wait()?;
        log::debug!(
            "Encoded {} frames to {}",
            self.frames_written,
            self.path.display()
        );
        Ok(())
    }
}

impl Drop for FfmpegProcessEncoder {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Keeps frames in memory. Used by previews and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<RgbImage>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: RgbImage) -> Result<(), VideoError> {
        if self.finished {
            return Err(VideoError::Finished);
        }
        self.frames.push(frame);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), VideoError> {
        self.finished = true;
        Ok(())
    }
}

/// Runs a sink on its own thread, fed through a bounded queue.
///
/// The render loop blocks only when `depth` frames are already waiting.
pub struct ThreadedSink<S> {
    sender: Option<Sender<RgbImage>>,
    worker: Option<JoinHandle<Result<S, VideoError>>>,
    inner: Option<S>,
}

impl<S: FrameSink + Send + 'static> ThreadedSink<S> {
    pub fn spawn(mut inner: S, depth: usize) -> Result<Self, VideoError> {
        let (sender, receiver) = bounded::<RgbImage>(depth.max(1));

        let worker = thread::Builder::new()
            .name("frame-writer".to_string())
            .spawn(move || -> Result<S, VideoError> {
                for frame in receiver {
                    inner.write_frame(frame)?;
                }
                inner.finish()?;
                Ok(inner)
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            inner: None,
        })
    }

    /// Finish and hand back the wrapped sink.
    pub fn into_inner(mut self) -> Result<S, VideoError> {
        self.join()?;
        self.inner.take().ok_or(VideoError::WorkerStopped)
    }

    fn join(&mut self) -> Result<(), VideoError> {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let inner = worker.join().map_err(|_| VideoError::WorkerStopped)??;
            self.inner = Some(inner);
        }
        Ok(())
    }
}

impl<S: FrameSink + Send + 'static> FrameSink for ThreadedSink<S> {
    fn write_frame(&mut self, frame: RgbImage) -> Result<(), VideoError> {
        let sender = self.sender.as_ref().ok_or(VideoError::Finished)?;
        if sender.send(frame).is_err() {
            // The writer hung up, so it failed; surface its error.
            self.join()?;
            return Err(VideoError::WorkerStopped);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), VideoError> {
        self.join()
    }
}

impl<S> Drop for ThreadedSink<S> {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
