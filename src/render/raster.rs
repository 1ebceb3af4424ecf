//! CPU rasterization of particle shapes onto an RGB canvas.
//!
//! Shapes overwrite pixels with their colour; there is no alpha channel.
//! Fading is done by the caller scaling the colour before drawing. Glow is
//! the one additive operation.

use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use image::{imageops, GrayImage, Luma, Rgb, RgbImage};

/// Gaussian sigma of the glow falloff (a 21-tap kernel).
const GLOW_SIGMA: f32 = 3.5;
/// Room around the glow disc for the blur to spread into.
const GLOW_PAD: i32 = 11;

/// Geometry of one particle shape, centred on the particle position.
///
/// Rotations are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Filled disc.
    Circle { radius: f32 },
    /// Square with sides `2 * half_side`.
    Square { half_side: f32, rotation: f32 },
    /// Equilateral triangle inscribed in a circle of `radius`.
    Triangle { radius: f32, rotation: f32 },
    /// Five-pointed star.
    Star {
        outer_radius: f32,
        inner_radius: f32,
        rotation: f32,
    },
}

impl Shape {
    /// Polygon outline around `(cx, cy)`; `None` for circles.
    pub fn outline(&self, cx: f32, cy: f32) -> Option<Vec<(f32, f32)>> {
        let polar = |radius: f32, angle: f32| (cx + radius * angle.cos(), cy + radius * angle.sin());

        match *self {
            Shape::Circle { .. } => None,
            Shape::Square {
                half_side,
                rotation,
            } => {
                let base = rotation.to_radians() + PI / 4.0;
                let radius = half_side * std::f32::consts::SQRT_2;
                Some(
                    (0..4)
                        .map(|i| polar(radius, base + i as f32 * FRAC_PI_2))
                        .collect(),
                )
            }
            Shape::Triangle { radius, rotation } => {
                let base = rotation.to_radians();
                Some(
                    (0..3)
                        .map(|i| polar(radius, base + i as f32 * TAU / 3.0))
                        .collect(),
                )
            }
            Shape::Star {
                outer_radius,
                inner_radius,
                rotation,
            } => {
                let base = rotation.to_radians();
                Some(
                    (0..10)
                        .map(|i| {
                            let radius = if i % 2 == 0 { outer_radius } else { inner_radius };
                            polar(radius, base + i as f32 * PI / 5.0)
                        })
                        .collect(),
                )
            }
        }
    }
}

/// Draw `shape` centred at `(cx, cy)`.
pub fn fill_shape(img: &mut RgbImage, cx: f32, cy: f32, shape: &Shape, color: [u8; 3]) {
    match shape.outline(cx, cy) {
        Some(points) => fill_polygon(img, &points, color),
        None => {
            if let Shape::Circle { radius } = shape {
                fill_circle(img, cx as i32, cy as i32, *radius as i32, color);
            }
        }
    }
}

/// Fill every pixel within `radius` of `(cx, cy)`. Radius 0 lights the
/// centre pixel only. Off-canvas parts are clipped.
pub fn fill_circle(img: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: [u8; 3]) {
    if radius < 0 {
        return;
    }
    let (w, h) = (img.width() as i32, img.height() as i32);
    let r2 = radius as i64 * radius as i64;

    for y in (cy - radius).max(0)..=(cy + radius).min(h - 1) {
        let dy = (y - cy) as i64;
        for x in (cx - radius).max(0)..=(cx + radius).min(w - 1) {
            let dx = (x - cx) as i64;
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(x as u32, y as u32, Rgb(color));
            }
        }
    }
}

/// Fill a simple polygon with the even-odd rule, sampling pixel centres.
pub fn fill_polygon(img: &mut RgbImage, points: &[(f32, f32)], color: [u8; 3]) {
    if points.len() < 3 {
        return;
    }
    let (w, h) = (img.width() as i32, img.height() as i32);

    let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }

    let row_start = (min_y.floor() as i32).max(0);
    let row_end = (max_y.ceil() as i32).min(h - 1);
    let mut crossings: Vec<f32> = Vec::with_capacity(points.len());

    for y in row_start..=row_end {
        let sample_y = y as f32 + 0.5;
        crossings.clear();

        for (i, &(x0, y0)) in points.iter().enumerate() {
            let (x1, y1) = points[(i + 1) % points.len()];
            if (y0 <= sample_y && sample_y < y1) || (y1 <= sample_y && sample_y < y0) {
                crossings.push(x0 + (sample_y - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for span in crossings.chunks_exact(2) {
            let start = ((span[0] - 0.5).ceil() as i32).max(0);
            let end = ((span[1] - 0.5).ceil() as i32).min(w);
            for x in start..end {
                img.put_pixel(x as u32, y as u32, Rgb(color));
            }
        }
    }
}

/// Blurred glow discs, cached by radius.
///
/// Glow radii are small integers, so a run reuses a handful of masks.
#[derive(Debug, Default)]
pub struct GlowCache {
    masks: HashMap<i32, GrayImage>,
}

impl GlowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached masks.
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Blurred mask for a disc of `radius`, `2 * (radius + pad) + 1` pixels square.
    fn mask(&mut self, radius: i32) -> &GrayImage {
        self.masks.entry(radius).or_insert_with(|| {
            let extent = radius + GLOW_PAD;
            let side = (2 * extent + 1) as u32;
            let mut disc = GrayImage::new(side, side);
            let r2 = radius as i64 * radius as i64;
            for (x, y, px) in disc.enumerate_pixels_mut() {
                let dx = x as i64 - extent as i64;
                let dy = y as i64 - extent as i64;
                if dx * dx + dy * dy <= r2 {
                    *px = Luma([255]);
                }
            }
            imageops::blur(&disc, GLOW_SIGMA)
        })
    }
}

/// Additively blend a soft glow of `radius` around `(cx, cy)`.
///
/// Each pixel gains `mask / 255 * color * strength`, saturating at 255.
pub fn add_glow(
    img: &mut RgbImage,
    cache: &mut GlowCache,
    cx: i32,
    cy: i32,
    radius: i32,
    color: [u8; 3],
    strength: f32,
) {
    if radius < 0 || strength <= 0.0 || color == [0, 0, 0] {
        return;
    }
    let (w, h) = (img.width() as i32, img.height() as i32);
    let mask = cache.mask(radius);
    let extent = radius + GLOW_PAD;

    for (mx, my, m) in mask.enumerate_pixels() {
        if m[0] == 0 {
            continue;
        }
        let x = cx - extent + mx as i32;
        let y = cy - extent + my as i32;
        if x < 0 || y < 0 || x >= w || y >= h {
            continue;
        }

        let weight = m[0] as f32 / 255.0 * strength;
        let px = img.get_pixel_mut(x as u32, y as u32);
        for c in 0..3 {
            let value = px[c] as f32 + weight * color[c] as f32;
            px[c] = value.round().min(255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    #[test]
    fn test_circle_radius_zero_is_one_pixel() {
        let mut img = RgbImage::new(10, 10);
        fill_circle(&mut img, 5, 5, 0, [255, 0, 0]);
        assert_eq!(lit(&img), 1);
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0]);
    }

    #[test]
    fn test_circle_clips_at_edges() {
        let mut img = RgbImage::new(10, 10);
        fill_circle(&mut img, 0, 0, 3, [0, 255, 0]);
        assert!(lit(&img) > 0);
        fill_circle(&mut img, -50, -50, 3, [0, 255, 0]);
    }

    #[test]
    fn test_square_area() {
        let mut img = RgbImage::new(40, 40);
        let shape = Shape::Square {
            half_side: 5.0,
            rotation: 0.0,
        };
        fill_shape(&mut img, 20.0, 20.0, &shape, [255, 255, 255]);
        assert_eq!(lit(&img), 100);
    }

    #[test]
    fn test_star_smaller_than_its_circle() {
        let star = Shape::Star {
            outer_radius: 10.0,
            inner_radius: 4.0,
            rotation: 18.0,
        };
        let mut star_img = RgbImage::new(40, 40);
        fill_shape(&mut star_img, 20.0, 20.0, &star, [255, 255, 0]);

        let mut circle_img = RgbImage::new(40, 40);
        fill_shape(&mut circle_img, 20.0, 20.0, &Shape::Circle { radius: 10.0 }, [255, 255, 0]);

        assert!(lit(&star_img) > 0);
        assert!(lit(&star_img) < lit(&circle_img));
        // Centre of the star is filled.
        assert_eq!(star_img.get_pixel(20, 20).0, [255, 255, 0]);
    }

    #[test]
    fn test_triangle_has_three_vertices() {
        let outline = Shape::Triangle {
            radius: 6.0,
            rotation: 90.0,
        }
        .outline(0.0, 0.0)
        .unwrap();
        assert_eq!(outline.len(), 3);
        assert!((outline[0].0).abs() < 1e-4);
        assert!((outline[0].1 - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_glow_is_additive_and_saturates() {
        let mut img = RgbImage::from_pixel(30, 30, Rgb([250, 10, 0]));
        let mut cache = GlowCache::new();
        add_glow(&mut img, &mut cache, 15, 15, 4, [100, 100, 100], 1.0);

        let centre = img.get_pixel(15, 15).0;
        assert_eq!(centre[0], 255);
        assert!(centre[1] > 10);
        // Far corner unaffected.
        assert_eq!(img.get_pixel(0, 0).0, [250, 10, 0]);
        assert_eq!(cache.len(), 1);
    }
}
