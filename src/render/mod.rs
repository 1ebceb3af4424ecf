//! Software rendering onto 8-bit RGB frames.
//!
//! - [`raster`]: shape geometry, scanline fills and additive glow
//! - [`effects`]: temporal blending and the anti-alias blur

pub mod effects;
pub mod raster;

pub use effects::{blend_frames, blend_weight, blur_3x3};
pub use raster::{add_glow, fill_circle, fill_polygon, fill_shape, GlowCache, Shape};
