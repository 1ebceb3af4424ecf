//! The live particle collection, its trail buffer and the motion model.
//!
//! Neither collection has a capacity bound: the population settles where the
//! spawn rate meets the death rate, and capping it would change the picture.

use std::cmp::Ordering;

use image::RgbImage;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::particle::{scale_color, Particle, TrailPoint};
use crate::render::raster::{add_glow, fill_circle, fill_shape, GlowCache};

/// Frame rate the per-step resistance factors are defined at.
const RESISTANCE_REFERENCE_FPS: f32 = 30.0;
/// Fraction of the canvas height, from the top, where life loss is scaled by
/// the distance to the top edge.
const TOP_FADE_BAND: f32 = 0.05;
/// Trail points at or below this life are purged.
const TRAIL_PURGE_LIFE: f32 = 0.1;
/// Trail life lost per second.
const TRAIL_DECAY_RATE: f32 = 0.5;
const GLOW_IMPORTANCE: f32 = 0.6;
const GLOW_MIN_SIZE: i32 = 10;

/// Owns every live particle and trail point of one video.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    width: u32,
    height: u32,
    particles: Vec<Particle>,
    trails: Vec<TrailPoint>,
    rng: SmallRng,
}

impl ParticleSystem {
    /// Empty system for a `width` x `height` canvas, seeded for reproducible runs.
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            particles: Vec::new(),
            trails: Vec::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Live particles in insertion order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn trails(&self) -> &[TrailPoint] {
        &self.trails
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Add one particle derived from a frame's features.
    pub fn spawn(&mut self, intensity: f32, frequency: f32, energy: f32, note_duration: f32) {
        let particle = Particle::spawn(
            &mut self.rng,
            self.width,
            self.height,
            intensity,
            frequency,
            energy,
            note_duration,
        );
        self.particles.push(particle);
    }

    /// Insert a hand-built particle.
    pub fn push(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Particles whose life runs out or that leave through the top are
    /// dropped. Trailed particles leave one trail point per step.
    pub fn step(&mut self, dt: f32) {
        let width = self.width as f32;
        let fade_band = self.height as f32 * TOP_FADE_BAND;
        let trails = &mut self.trails;

        self.particles.retain_mut(|particle| {
            advance(particle, dt, width, fade_band);
            if particle.has_trail {
                trails.push(particle.trail_point());
            }
            particle.is_alive()
        });

        self.trails.retain(|trail| trail.life > TRAIL_PURGE_LIFE);
        for trail in &mut self.trails {
            trail.life -= dt * TRAIL_DECAY_RATE;
        }
    }

    /// Live particles sorted for painting: descending by importance, then size.
    pub fn render_order(&self) -> Vec<&Particle> {
        let mut ordered: Vec<&Particle> = self.particles.iter().collect();
        ordered.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(Ordering::Equal)
                .then(b.size.partial_cmp(&a.size).unwrap_or(Ordering::Equal))
        });
        ordered
    }

    /// Paint trails, then particles in [`render_order`](Self::render_order).
    ///
    /// Colours are pre-scaled by life; glowing particles get their glow
    /// added before the shape is drawn over it.
    pub fn draw(&self, frame: &mut RgbImage, glow: &mut GlowCache) {
        for trail in &self.trails {
            let alpha = (trail.alpha * trail.life).max(0.0);
            let radius = (trail.size * trail.life) as i32;
            fill_circle(
                frame,
                trail.x as i32,
                trail.y as i32,
                radius,
                scale_color(trail.color, alpha),
            );
        }

        for particle in self.render_order() {
            let size = (particle.size * particle.life) as i32;
            let color = scale_color(particle.color, particle.life);

            if particle.importance > GLOW_IMPORTANCE || size > GLOW_MIN_SIZE {
                add_glow(
                    frame,
                    glow,
                    particle.x as i32,
                    particle.y as i32,
                    size * 2,
                    scale_color(color, 0.5),
                    particle.life,
                );
            }

            let shape = particle.shape.geometry(size as f32, particle.rotation);
            fill_shape(frame, particle.x, particle.y, &shape, color);
        }
    }
}

/// Move one particle forward by `dt`, in the fixed order: wave, position,
/// velocity decay, dance, rotation, life, horizontal clamp.
fn advance(particle: &mut Particle, dt: f32, width: f32, fade_band: f32) {
    let time_factor = (1.0 - particle.life) * 10.0;

    let mut wave_offset =
        particle.wave_amplitude * (particle.wave_frequency * time_factor + particle.phase).sin();
    if particle.importance > 0.7 {
        wave_offset *= 1.0 + (time_factor * 0.5).cos() * 0.5;
    }

    particle.x += particle.vx * dt + wave_offset * dt;
    particle.y += particle.vy * dt;

    let (resistance_x, resistance_y): (f32, f32) = if particle.has_trail {
        (0.995, 0.998)
    } else {
        (0.99, 0.995)
    };
    let steps = dt * RESISTANCE_REFERENCE_FPS;
    particle.vx *= resistance_x.powf(steps);
    particle.vy *= resistance_y.powf(steps);

    // Lateral jitter goes straight into position, after the velocity move.
    let mut dance = (time_factor * 2.0).sin() * particle.wave_amplitude * 0.4;
    if particle.importance > 0.6 {
        dance *= 1.0 + (time_factor * 0.7).sin() * 0.3;
    }
    particle.x += dance * dt;

    let mut rot_speed = 45.0 + dance.abs();
    if particle.importance > 0.7 {
        rot_speed *= 1.5;
    }
    particle.rotation += dt * rot_speed;

    let fade = if particle.y < fade_band {
        particle.y / fade_band
    } else {
        1.0
    };

    let mut life_reduction = dt / particle.max_life;
    if particle.importance > 0.7 {
        life_reduction *= 0.7;
    }
    particle.life -= life_reduction * fade;

    particle.x = particle.x.clamp(0.0, width);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::particle::ShapeKind;

    fn particle(importance: f32, size: f32) -> Particle {
        Particle {
            x: 50.0,
            y: 50.0,
            vx: 0.0,
            vy: -10.0,
            size,
            color: [200, 100, 50],
            rotation: 0.0,
            shape: ShapeKind::Circle,
            life: 1.0,
            max_life: 2.0,
            acceleration: 0.03,
            wave_amplitude: 8.0,
            wave_frequency: 2.0,
            phase: 0.0,
            trail_length: 0.0,
            importance,
            sustain: 0.1,
            pitch: 0.5,
            intensity: 0.5,
            has_trail: false,
            trail_color: [140, 70, 35],
        }
    }

    #[test]
    fn test_step_empty_system() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.step(1.0 / 30.0);
        system.step(0.0);
        assert!(system.is_empty());
        assert!(system.trails().is_empty());
    }

    #[test]
    fn test_resistance_matches_per_frame_factor_at_30fps() {
        let mut system = ParticleSystem::new(100, 100, 1);
        let mut p = particle(0.1, 4.0);
        p.vx = 100.0;
        system.push(p);
        system.step(1.0 / 30.0);

        let p = &system.particles()[0];
        assert!((p.vx - 99.0).abs() < 1e-3);
        assert!((p.vy + 9.95).abs() < 1e-4);
    }

    #[test]
    fn test_life_decays_by_dt_over_max_life() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.push(particle(0.1, 4.0));
        system.push(particle(0.9, 4.0));
        system.step(0.1);

        let lives: Vec<f32> = system.particles().iter().map(|p| p.life).collect();
        assert!((lives[0] - 0.95).abs() < 1e-6);
        // Important particles decay at 70% of the base rate.
        assert!((lives[1] - 0.965).abs() < 1e-6);
    }

    /// Step one particle at life 0.5 (time factor 5) by 0.1 s.
    fn step_half_life(importance: f32) -> Particle {
        let mut system = ParticleSystem::new(100, 100, 1);
        let mut p = particle(importance, 4.0);
        p.life = 0.5;
        system.push(p);
        system.step(0.1);
        system.particles()[0].clone()
    }

    #[test]
    fn test_step_motion_plain_particle() {
        let p = step_half_life(0.5);

        // wave = 8 sin(10), dance = 3.2 sin(10), both added over 0.1 s.
        assert!((p.x - 49.390_70).abs() < 1e-3, "x = {}", p.x);
        assert!((p.y - 49.0).abs() < 1e-5);
        // 0.1 * (45 + |dance|)
        assert!((p.rotation - 4.674_09).abs() < 1e-3, "rotation = {}", p.rotation);
        assert!((p.life - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_step_motion_important_particle() {
        let p = step_half_life(0.9);

        // wave *= 1 + 0.5 cos(2.5), dance *= 1 + 0.3 sin(3.5)
        assert!((p.x - 49.583_35).abs() < 1e-3, "x = {}", p.x);
        // Rotation speed gets the 1.5x boost.
        assert!((p.rotation - 6.983_65).abs() < 1e-3, "rotation = {}", p.rotation);
        assert!((p.life - 0.465).abs() < 1e-6);
    }

    #[test]
    fn test_top_band_scales_life_decay() {
        let mut system = ParticleSystem::new(100, 1000, 1);
        let mut p = particle(0.1, 4.0);
        p.y = 25.0;
        p.vy = 0.0;
        system.push(p);
        system.step(0.1);
        // fade = 25 / 50
        assert!((system.particles()[0].life - 0.975).abs() < 1e-6);
    }

    #[test]
    fn test_particle_leaving_top_is_removed() {
        let mut system = ParticleSystem::new(100, 100, 1);
        let mut p = particle(0.1, 4.0);
        p.y = 1.0;
        p.vy = -100.0;
        system.push(p);
        system.step(0.1);
        assert!(system.is_empty());
    }

    #[test]
    fn test_x_is_clamped() {
        let mut system = ParticleSystem::new(100, 100, 1);
        let mut p = particle(0.1, 4.0);
        p.x = 99.0;
        p.vx = 10_000.0;
        system.push(p);
        system.step(0.1);
        assert_eq!(system.particles()[0].x, 100.0);
    }

    #[test]
    fn test_trails_emitted_and_purged() {
        let mut system = ParticleSystem::new(100, 100, 1);
        let mut p = particle(0.1, 10.0);
        p.has_trail = true;
        system.push(p);

        system.step(0.1);
        assert_eq!(system.trails().len(), 1);
        let trail = system.trails()[0];
        assert!((trail.size - 7.0).abs() < 1e-5);
        assert_eq!(trail.alpha, 0.5);
        // Snapshot life 0.95, then decayed by 0.05.
        assert!((trail.life - 0.9).abs() < 1e-5);

        // Remove the source and let the trail expire.
        system.particles.clear();
        for _ in 0..20 {
            system.step(0.1);
        }
        assert!(system.trails().is_empty());
    }

    #[test]
    fn test_render_order_descending() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.push(particle(0.2, 4.0));
        system.push(particle(0.9, 5.0));
        system.push(particle(0.9, 20.0));

        let order: Vec<(f32, f32)> = system
            .render_order()
            .iter()
            .map(|p| (p.importance, p.size))
            .collect();
        assert_eq!(order, vec![(0.9, 20.0), (0.9, 5.0), (0.2, 4.0)]);
    }

    #[test]
    fn test_draw_paints_particle() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.push(particle(0.1, 6.0));
        let mut frame = RgbImage::new(100, 100);
        let mut glow = GlowCache::new();

        system.draw(&mut frame, &mut glow);

        assert_eq!(frame.get_pixel(50, 50).0, [200, 100, 50]);
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0]);
        assert!(glow.is_empty());
    }

    #[test]
    fn test_draw_glow_for_important_particle() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.push(particle(0.9, 6.0));
        let mut frame = RgbImage::new(100, 100);
        let mut glow = GlowCache::new();

        system.draw(&mut frame, &mut glow);

        assert_eq!(glow.len(), 1);
        // Outside the shape but inside the glow radius.
        assert_ne!(frame.get_pixel(60, 50).0, [0, 0, 0]);
    }

    fn trail(x: f32, y: f32, alpha: f32) -> TrailPoint {
        TrailPoint {
            x,
            y,
            color: [200, 100, 40],
            size: 8.0,
            life: 0.5,
            alpha,
        }
    }

    #[test]
    fn test_draw_trail_colour_and_radius() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.trails.push(trail(30.0, 30.0, 0.5));
        let mut frame = RgbImage::new(100, 100);

        system.draw(&mut frame, &mut GlowCache::new());

        // colour * alpha * life = colour * 0.25, radius = size * life = 4
        assert_eq!(frame.get_pixel(30, 30).0, [50, 25, 10]);
        assert_eq!(frame.get_pixel(34, 30).0, [50, 25, 10]);
        assert_eq!(frame.get_pixel(35, 30).0, [0, 0, 0]);
    }

    #[test]
    fn test_draw_negative_trail_alpha_paints_black() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.trails.push(trail(30.0, 30.0, -1.0));
        let mut frame = RgbImage::from_pixel(100, 100, image::Rgb([60, 60, 60]));

        system.draw(&mut frame, &mut GlowCache::new());

        assert_eq!(frame.get_pixel(30, 30).0, [0, 0, 0]);
        assert_eq!(frame.get_pixel(40, 30).0, [60, 60, 60]);
    }

    #[test]
    fn test_draw_particle_over_trail() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.push(particle(0.1, 6.0));
        system.trails.push(TrailPoint {
            size: 16.0,
            ..trail(50.0, 50.0, 0.5)
        });
        let mut frame = RgbImage::new(100, 100);

        system.draw(&mut frame, &mut GlowCache::new());

        assert_eq!(frame.get_pixel(50, 50).0, [200, 100, 50]);
        // Trail ring between the particle (radius 6) and the trail (radius 8).
        assert_eq!(frame.get_pixel(50, 42).0, [50, 25, 10]);
    }

    #[test]
    fn test_draw_glow_for_large_particle() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.push(particle(0.3, 14.0));
        let mut frame = RgbImage::new(100, 100);
        let mut glow = GlowCache::new();

        system.draw(&mut frame, &mut glow);

        assert_eq!(glow.len(), 1);
        assert_eq!(frame.get_pixel(50, 50).0, [200, 100, 50]);
        // Past the 14 px shape, inside the 28 px glow.
        assert_ne!(frame.get_pixel(70, 50).0, [0, 0, 0]);
    }

    #[test]
    fn test_small_unimportant_particle_has_no_glow() {
        let mut system = ParticleSystem::new(100, 100, 1);
        system.push(particle(0.3, 10.0));
        let mut glow = GlowCache::new();

        system.draw(&mut RgbImage::new(100, 100), &mut glow);

        assert!(glow.is_empty());
    }

    #[test]
    fn test_same_seed_same_spawns() {
        let mut a = ParticleSystem::new(320, 240, 99);
        let mut b = ParticleSystem::new(320, 240, 99);
        for _ in 0..5 {
            a.spawn(0.5, 0.5, 0.5, 0.3);
            b.spawn(0.5, 0.5, 0.5, 0.3);
        }
        assert_eq!(a.particles(), b.particles());
    }
}
