//! Audio-driven particle simulation.
//!
//! [`Particle::spawn`] maps one frame of features to a particle;
//! [`ParticleSystem`] moves, ages and draws the population.

pub mod particle;
pub mod system;

pub use particle::{hsv_to_rgb, importance, scale_color, Particle, ShapeKind, TrailPoint};
pub use system::ParticleSystem;
