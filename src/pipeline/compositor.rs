//! Per-frame orchestration: features in, finished raster out.

use image::RgbImage;

use crate::audio::FeatureTrack;
use crate::particles::ParticleSystem;
use crate::render::{blend_frames, blend_weight, blur_3x3, GlowCache};
use crate::video::VideoError;

/// Errors raised while producing frames.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(u32),
    #[error("Audio is too short to produce any video frames")]
    EmptyTrack,
    #[error("Frame {index} is past the end of the track ({len} frames)")]
    FrameOutOfRange { index: usize, len: usize },
    #[error("Failed to write frame: {0}")]
    FrameWrite(#[from] VideoError),
}

/// Particles spawned for one frame: `round(10 + energy*30 + intensity*20)`.
pub fn spawn_count(intensity: f32, energy: f32) -> usize {
    (10.0 + energy * 30.0 + intensity * 20.0).round().max(0.0) as usize
}

/// Turns a [`FeatureTrack`] into frames, one call per frame, in order.
///
/// Holds the particle system, the previous blended frame and the glow masks.
#[derive(Debug)]
pub struct FrameCompositor {
    width: u32,
    height: u32,
    fps: u32,
    note_window: usize,
    system: ParticleSystem,
    glow: GlowCache,
    previous: Option<RgbImage>,
}

impl FrameCompositor {
    pub fn new(
        width: u32,
        height: u32,
        fps: u32,
        note_window: usize,
        seed: u64,
    ) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        if fps == 0 {
            return Err(RenderError::InvalidFrameRate(fps));
        }

        Ok(Self {
            width,
            height,
            fps,
            note_window,
            system: ParticleSystem::new(width, height, seed),
            glow: GlowCache::new(),
            previous: None,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn system(&self) -> &ParticleSystem {
        &self.system
    }

    /// Render frame `index`.
    ///
    /// Spawns for the frame, steps the simulation by one frame period, draws
    /// onto black, blends with the previous frame and blurs. Frames must be
    /// requested in ascending order; the simulation only moves forward.
    pub fn render_frame(
        &mut self,
        track: &FeatureTrack,
        index: usize,
    ) -> Result<RgbImage, RenderError> {
        let features = track.frame(index).ok_or(RenderError::FrameOutOfRange {
            index,
            len: track.len(),
        })?;
        let note_duration = track.note_duration(index, self.note_window, self.fps);

        for _ in 0..spawn_count(features.intensity, features.energy) {
            self.system.spawn(
                features.intensity,
                features.frequency,
                features.energy,
                note_duration,
            );
        }
        self.system.step(1.0 / self.fps as f32);

        let mut canvas = RgbImage::new(self.width, self.height);
        self.system.draw(&mut canvas, &mut self.glow);

        let blended = match &self.previous {
            Some(previous) => blend_frames(canvas, previous, blend_weight(features.energy)),
            None => canvas,
        };
        let frame = blur_3x3(&blended);
        self.previous = Some(blended);

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_track(frames: usize, level: f32) -> FeatureTrack {
        // Constant input normalizes to zero; a ramp gives a spread of values.
        let raw: Vec<f32> = (0..frames).map(|i| level + i as f32 * 0.01).collect();
        FeatureTrack::build(&raw, &raw, &raw, frames as f64 / 30.0, frames)
    }

    #[test]
    fn test_spawn_count() {
        assert_eq!(spawn_count(0.0, 0.0), 10);
        assert_eq!(spawn_count(1.0, 1.0), 60);
        assert_eq!(spawn_count(0.5, 0.5), 35);
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(matches!(
            FrameCompositor::new(0, 10, 30, 10, 1),
            Err(RenderError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            FrameCompositor::new(10, 10, 0, 10, 1),
            Err(RenderError::InvalidFrameRate(0))
        ));
    }

    #[test]
    fn test_render_frame_size_and_spawns() {
        let track = flat_track(5, 0.5);
        let mut compositor = FrameCompositor::new(64, 48, 30, 10, 42).unwrap();

        let frame = compositor.render_frame(&track, 0).unwrap();
        assert_eq!(frame.dimensions(), (64, 48));
        // Frame 0 has all features at 0 after normalization: ten spawns.
        assert!(compositor.system().len() <= 10);
        assert!(!compositor.system().is_empty());
    }

    #[test]
    fn test_render_frame_out_of_range() {
        let track = flat_track(3, 0.5);
        let mut compositor = FrameCompositor::new(32, 32, 30, 10, 1).unwrap();
        assert!(matches!(
            compositor.render_frame(&track, 3),
            Err(RenderError::FrameOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_same_seed_same_frames() {
        let track = flat_track(4, 0.2);
        let mut a = FrameCompositor::new(48, 32, 30, 10, 7).unwrap();
        let mut b = FrameCompositor::new(48, 32, 30, 10, 7).unwrap();
        for i in 0..4 {
            assert_eq!(
                a.render_frame(&track, i).unwrap(),
                b.render_frame(&track, i).unwrap()
            );
        }
    }
}
