mod cli;

use std::io::Write;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use cli::{Args, Command};
use particle_visualizer::audio::{generate_test_beat, write_wav};
use particle_visualizer::{
    analyze_audio_file, derive_output_path, progress_channel, render_preview, render_video,
    AnalysisSummary, CancellationToken,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Render {
            audio,
            output,
            output_dir,
            render,
        } => {
            let config = render.pipeline_config()?;
            let output = match output {
                Some(path) => path,
                None => derive_output_path(&output_dir, &audio).with_context(|| {
                    format!("Failed to prepare output directory {}", output_dir.display())
                })?,
            };

            let (reporter, progress) = progress_channel();
            let worker = {
                let audio = audio.clone();
                thread::Builder::new()
                    .name("render".to_string())
                    .spawn(move || {
                        render_video(&audio, &output, &config, reporter, &CancellationToken::new())
                    })?
            };

            // The channel closes when the worker drops its reporter.
            for event in progress {
                print!("\r[{:>3}%] {:<40}", event.percent, event.message);
                let _ = std::io::stdout().flush();
            }
            println!();

            let written = worker
                .join()
                .map_err(|_| anyhow!("Render thread panicked"))?
                .with_context(|| format!("Failed to render {}", audio.display()))?;
            println!("Saved {}", written.display());
        }

        Command::Analyze { audio, fps } => {
            let features = analyze_audio_file(&audio, &Default::default())
                .with_context(|| format!("Failed to analyze {}", audio.display()))?;
            let summary = AnalysisSummary::new(&features, fps);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Preview {
            audio,
            frame,
            output,
            render,
        } => {
            let config = render.pipeline_config()?;
            let image = render_preview(&audio, &config, frame)
                .with_context(|| format!("Failed to render frame {}", frame))?;
            image
                .save(&output)
                .with_context(|| format!("Failed to save {}", output.display()))?;
            println!("Saved frame {} to {}", frame, output.display());
        }

        Command::Synth {
            output,
            bpm,
            duration,
            sample_rate,
        } => {
            let samples = generate_test_beat(bpm, sample_rate, duration);
            write_wav(&output, &samples, sample_rate)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Wrote {:.1}s at {} BPM to {}",
                duration,
                bpm,
                output.display()
            );
        }
    }

    Ok(())
}
