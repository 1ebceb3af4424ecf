//! Example: Render particle frames from synthetic audio.
//!
//! Generates a beat pattern, analyses it, runs the particle compositor and
//! saves every tenth frame as a PNG. No FFmpeg needed.
//!
//! Run with:
//!     cargo run --example render_synthetic

use std::path::Path;

use particle_visualizer::audio::synth::generate_test_beat;
use particle_visualizer::audio::{analyze_samples, AnalysisConfig, FeatureTrack};
use particle_visualizer::FrameCompositor;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Particle Visualizer - Synthetic Audio Example");
    println!("=============================================\n");

    let sample_rate: u32 = 44100;
    let duration_secs: f32 = 3.0;
    let bpm: f32 = 120.0;

    println!("Generating synthetic beat...");
    println!("  Sample rate: {} Hz", sample_rate);
    println!("  Duration: {} seconds", duration_secs);
    println!("  BPM: {}", bpm);
    let samples = generate_test_beat(bpm, sample_rate, duration_secs);
    println!("  Generated {} samples\n", samples.len());

    println!("Analyzing audio...");
    let features = analyze_samples(&samples, sample_rate, &AnalysisConfig::default());
    println!("  Duration: {:.2}s", features.duration);
    println!("  Tempo: {:.1} BPM", features.tempo);
    println!("  Beats detected: {}", features.beats.len());
    println!("  Analysis frames: {}\n", features.num_frames());

    let (width, height, fps) = (640, 360, 30);
    let track = FeatureTrack::from_features(&features, fps);
    let mut compositor = FrameCompositor::new(width, height, fps, 10, 2024)?;

    let out_dir = Path::new("synthetic_frames");
    std::fs::create_dir_all(out_dir)?;

    println!("Rendering {} frames at {}x{}...", track.len(), width, height);
    for index in 0..track.len() {
        let frame = compositor.render_frame(&track, index)?;
        if index % 10 == 0 {
            let path = out_dir.join(format!("frame_{:04}.png", index));
            frame.save(&path)?;
            println!(
                "  Frame {:>3}: {:>4} particles -> {}",
                index,
                compositor.system().len(),
                path.display()
            );
        }
    }

    println!("\nDone! Frames in {}", out_dir.display());
    Ok(())
}
