//! Final assembly: attach the source audio to the rendered video.
//!
//! Intermediate files live in a temporary directory next to the output. The
//! directory is removed when the [`VideoAssembly`] is dropped, whether or not
//! the mux succeeded.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const VIDEO_FILE: &str = "video.mp4";
const AUDIO_FILE: &str = "audio.m4a";
const AUDIO_BITRATE: &str = "192k";

/// Errors that can occur while assembling the final file.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("ffmpeg not found ({binary}): {source}")]
    FfmpegMissing {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),
    #[error("Muxing failed: {0}")]
    Mux(String),
    #[error("Failed to create temporary workspace in {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Temp workspace and ffmpeg invocations for one output file.
#[derive(Debug)]
pub struct VideoAssembly {
    workspace: TempDir,
    output: PathBuf,
    ffmpeg: PathBuf,
}

impl VideoAssembly {
    /// Create the temp workspace beside `output`, creating its directory.
    pub fn new(output: &Path, ffmpeg: &Path) -> Result<Self, MuxError> {
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let workspace_err = |source: std::io::Error| MuxError::Workspace {
            path: parent.clone(),
            source,
        };

        std::fs::create_dir_all(&parent).map_err(workspace_err)?;
        let workspace = tempfile::Builder::new()
            .prefix(".particle-visualizer-")
            .tempdir_in(&parent)
            .map_err(workspace_err)?;

        log::debug!("Temporary workspace: {}", workspace.path().display());

        Ok(Self {
            workspace,
            output: output.to_path_buf(),
            ffmpeg: ffmpeg.to_path_buf(),
        })
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Where the video-only encode should be written.
    pub fn video_path(&self) -> PathBuf {
        self.workspace.path().join(VIDEO_FILE)
    }

    pub fn audio_path(&self) -> PathBuf {
        self.workspace.path().join(AUDIO_FILE)
    }

    /// Re-encode the audio of `source` to AAC in the workspace.
    pub fn extract_audio(&self, source: &Path) -> Result<PathBuf, MuxError> {
        let audio = self.audio_path();
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(source)
            .args(["-vn", "-c:a", "aac", "-b:a", AUDIO_BITRATE])
            .arg(&audio);

        let output = self.run(&mut command)?;
        if !output.status.success() {
            return Err(MuxError::AudioExtraction(stderr_text(&output)));
        }
        Ok(audio)
    }

    /// Combine the workspace video and audio into the output file.
    ///
    /// Streams are copied, not re-encoded; the shorter one sets the length.
    /// A partial output is deleted on failure. Consumes the assembly, which
    /// removes the workspace.
    pub fn mux(self) -> Result<PathBuf, MuxError> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(self.video_path())
            .arg("-i")
            .arg(self.audio_path())
            .args(["-map", "0:v:0", "-map", "1:a:0"])
            .args(["-c", "copy", "-shortest", "-movflags", "+faststart"])
            .arg(&self.output);

        let result = self.run(&mut command).and_then(|output| {
            if output.status.success() {
                Ok(())
            } else {
                Err(MuxError::Mux(stderr_text(&output)))
            }
        });

        if let Err(e) = result {
            self.remove_partial_output();
            return Err(e);
        }

        log::info!("Wrote {}", self.output.display());
        Ok(self.output.clone())
    }

    /// Delete whatever was written to the output path.
    pub fn remove_partial_output(&self) {
        if self.output.exists() {
            if let Err(e) = std::fs::remove_file(&self.output) {
                log::warn!(
                    "Failed to remove partial output {}: {}",
                    self.output.display(),
                    e
                );
            }
        }
    }

    fn run(&self, command: &mut Command) -> Result<Output, MuxError> {
        log::debug!("Running {:?}", command);
        command.output().map_err(|source| MuxError::FfmpegMissing {
            binary: self.ffmpeg.display().to_string(),
            source,
        })
    }
}

fn stderr_text(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr);
    let text = text.trim();
    if text.is_empty() {
        format!("ffmpeg exited with {}", output.status)
    } else {
        text.to_string()
    }
}
