//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use particle_visualizer::PipelineConfig;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "particle-visualizer")]
#[command(about = "Music-reactive particle video generator", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a video with the source audio attached
    Render {
        /// Input audio file
        audio: PathBuf,

        /// Output video path (derived from the audio name when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Directory for derived output names
        #[arg(long, value_name = "DIR", default_value = "output")]
        output_dir: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Print a JSON summary of the audio analysis
    Analyze {
        /// Input audio file
        audio: PathBuf,

        /// Frame rate used for the video frame count
        #[arg(long, default_value = "30")]
        fps: u32,
    },

    /// Render a single frame to an image
    Preview {
        /// Input audio file
        audio: PathBuf,

        /// Frame index to save
        #[arg(long, default_value = "0")]
        frame: usize,

        /// Output image (PNG)
        #[arg(short, long, value_name = "FILE", default_value = "preview.png")]
        output: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Write a synthetic drum pattern to a WAV file
    Synth {
        /// Output WAV path
        output: PathBuf,

        #[arg(long, default_value = "120")]
        bpm: f32,

        /// Length in seconds
        #[arg(long, default_value = "5")]
        duration: f32,

        #[arg(long, default_value = "44100")]
        sample_rate: u32,
    },
}

/// Settings shared by commands that render frames. Flags override the
/// config file, which overrides the defaults.
#[derive(ClapArgs, Debug, Default)]
pub struct RenderArgs {
    /// JSON pipeline config
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long)]
    pub fps: Option<u32>,

    /// Seed for the particle simulation
    #[arg(long)]
    pub seed: Option<u64>,

    /// H.264 quality (0-51, lower is better)
    #[arg(long)]
    pub crf: Option<u32>,
}

impl RenderArgs {
    /// Build the pipeline config from the optional file and the flags.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, particle_visualizer::PipelineError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(crf) = self.crf {
            config.crf = crf;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = RenderArgs {
            width: Some(640),
            height: Some(360),
            seed: Some(3),
            ..RenderArgs::default()
        };
        let config = args.pipeline_config().unwrap();
        assert_eq!((config.width, config.height), (640, 360));
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.fps, 30);
    }

    #[test]
    fn test_parse_render_command() {
        let args = Args::try_parse_from([
            "particle-visualizer",
            "render",
            "song.mp3",
            "--fps",
            "24",
            "-o",
            "out.mp4",
        ])
        .unwrap();

        match args.command {
            Command::Render {
                audio,
                output,
                render,
                ..
            } => {
                assert_eq!(audio, PathBuf::from("song.mp3"));
                assert_eq!(output, Some(PathBuf::from("out.mp4")));
                assert_eq!(render.fps, Some(24));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
