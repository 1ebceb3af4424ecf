//! Particle and trail records, and the rules that derive a particle's
//! parameters from one frame of audio features.

use std::f32::consts::TAU;

use rand::Rng;

use crate::render::raster::Shape;

/// Notes held longer than this (seconds) count as sustained.
pub const SUSTAIN_THRESHOLD_SECS: f32 = 0.5;
/// Height of the spawn band at the bottom of the canvas, in pixels.
pub const SPAWN_BAND_PX: f32 = 50.0;
/// Smallest particle size at spawn.
pub const MIN_SIZE: f32 = 4.0;
/// Shortest lifespan budget at spawn, in seconds.
pub const MIN_MAX_LIFE: f32 = 2.0;
/// Trails inherit this fraction of the particle colour.
const TRAIL_COLOR_SCALE: f32 = 0.7;
/// Trail snapshots are drawn at this fraction of the particle size.
const TRAIL_SIZE_SCALE: f32 = 0.7;
const TRAIL_ALPHA: f32 = 0.5;
const STAR_INNER_RATIO: f32 = 0.4;

/// Weighted salience of a sound: `0.4*intensity + 0.4*energy + 0.2*frequency`.
pub fn importance(intensity: f32, frequency: f32, energy: f32) -> f32 {
    intensity * 0.4 + energy * 0.4 + frequency * 0.2
}

/// Shape family of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Circle,
    Square,
    Triangle,
    Star,
}

impl ShapeKind {
    /// Pick a shape: star for important sounds, then triangle for high
    /// frequencies, square for low ones, circle otherwise. First match wins.
    pub fn select(importance: f32, frequency: f32) -> Self {
        if importance > 0.8 {
            Self::Star
        } else if frequency > 0.7 {
            Self::Triangle
        } else if frequency < 0.3 {
            Self::Square
        } else {
            Self::Circle
        }
    }

    /// Geometry for drawing at `size` pixels and `rotation` degrees.
    pub fn geometry(&self, size: f32, rotation: f32) -> Shape {
        match self {
            Self::Circle => Shape::Circle { radius: size },
            Self::Square => Shape::Square {
                half_side: size,
                rotation,
            },
            Self::Triangle => Shape::Triangle {
                radius: size,
                rotation,
            },
            Self::Star => Shape::Star {
                outer_radius: size,
                inner_radius: size * STAR_INNER_RATIO,
                rotation,
            },
        }
    }
}

/// Convert HSV (hue in degrees, saturation and value in 0..=1) to RGB.
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = value * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = value - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [r, g, b].map(|channel| ((channel + m) * 255.0).round().clamp(0.0, 255.0) as u8)
}

/// Scale an RGB colour, truncating like an integer cast.
pub fn scale_color(color: [u8; 3], factor: f32) -> [u8; 3] {
    color.map(|c| (c as f32 * factor).clamp(0.0, 255.0) as u8)
}

/// One simulated particle.
///
/// Everything except position, velocity, rotation and life is fixed at spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
    pub color: [u8; 3],
    /// Degrees.
    pub rotation: f32,
    pub shape: ShapeKind,
    /// Remaining life in (0, 1]; starts at 1.0.
    pub life: f32,
    /// Lifespan budget in seconds.
    pub max_life: f32,
    pub acceleration: f32,
    pub wave_amplitude: f32,
    pub wave_frequency: f32,
    pub phase: f32,
    pub trail_length: f32,
    pub importance: f32,
    /// Note duration the particle was spawned for, in seconds.
    pub sustain: f32,
    /// Normalized frequency the particle was spawned for.
    pub pitch: f32,
    pub intensity: f32,
    pub has_trail: bool,
    pub trail_color: [u8; 3],
}

impl Particle {
    /// Spawn a particle in the bottom band of a `width` x `height` canvas.
    pub fn spawn<R: Rng>(
        rng: &mut R,
        width: u32,
        height: u32,
        intensity: f32,
        frequency: f32,
        energy: f32,
        note_duration: f32,
    ) -> Self {
        let importance = importance(intensity, frequency, energy);
        let is_sustained = note_duration > SUSTAIN_THRESHOLD_SECS;

        let hue = (frequency * 360.0).rem_euclid(360.0);
        let saturation = (((energy * 0.7 + 0.3) * 255.0).min(255.0) as u8) as f32 / 255.0;
        let value = (((intensity * 0.7 + 0.3) * 255.0).min(255.0) as u8) as f32 / 255.0;
        let color = hsv_to_rgb(hue, saturation, value);

        let x = if width > 0 {
            rng.random_range(0.0..width as f32)
        } else {
            0.0
        };
        let y = height as f32 - rng.random_range(0.0..SPAWN_BAND_PX);

        let base_speed = 200.0 + intensity * 300.0;
        let vy = -base_speed * (1.5 + importance * 2.0) * (1.0 + importance * 1.2);

        let max_angle: f32 = if is_sustained { 45.0 } else { 30.0 };
        let angle = rng.random_range(-max_angle..=max_angle).to_radians();
        let vx = base_speed * angle.sin() * (1.0 + note_duration * 0.5) * (1.0 + energy * 0.8);

        let has_trail = is_sustained || importance > 0.7;

        Self {
            x,
            y,
            vx,
            vy,
            size: (intensity * energy * 25.0).max(MIN_SIZE),
            color,
            rotation: rng.random_range(0.0..360.0),
            shape: ShapeKind::select(importance, frequency),
            life: 1.0,
            max_life: (note_duration * 3.0 * (1.0 + importance)).max(MIN_MAX_LIFE),
            acceleration: 0.03 + energy * 0.08,
            wave_amplitude: 8.0 + energy * 20.0,
            wave_frequency: 2.0 + frequency * 8.0,
            phase: rng.random_range(0.0..TAU),
            trail_length: if has_trail { note_duration * 2.0 } else { 0.0 },
            importance,
            sustain: note_duration,
            pitch: frequency,
            intensity,
            has_trail,
            trail_color: scale_color(color, TRAIL_COLOR_SCALE),
        }
    }

    /// Still part of the simulation.
    pub fn is_alive(&self) -> bool {
        self.life > 0.0 && self.y >= 0.0
    }

    /// Snapshot of the current state for the trail buffer.
    pub fn trail_point(&self) -> TrailPoint {
        TrailPoint {
            x: self.x,
            y: self.y,
            color: self.trail_color,
            size: self.size * TRAIL_SIZE_SCALE,
            life: self.life,
            alpha: TRAIL_ALPHA,
        }
    }
}

/// A decaying remnant left behind by a trailed particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
    pub color: [u8; 3],
    pub size: f32,
    pub life: f32,
    pub alpha: f32,
}
