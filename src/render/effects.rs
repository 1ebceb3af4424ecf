//! Whole-frame post effects: temporal blending and anti-alias blur.

use image::RgbImage;

/// Blend weight of the new frame: `0.85 - energy * 0.3`.
pub fn blend_weight(energy: f32) -> f32 {
    0.85 - energy * 0.3
}

/// Blend `current` with `previous`, `current * weight + previous * (1 - weight)`,
/// rounded and saturated to 8 bits. Consumes `current` and returns the blend.
///
/// Frames of different sizes are not blended; `current` is returned unchanged.
pub fn blend_frames(mut current: RgbImage, previous: &RgbImage, weight: f32) -> RgbImage {
    if current.dimensions() != previous.dimensions() {
        return current;
    }

    let keep = 1.0 - weight;
    for (cur, prev) in current.iter_mut().zip(previous.iter()) {
        let value = *cur as f32 * weight + *prev as f32 * keep;
        *cur = value.round().clamp(0.0, 255.0) as u8;
    }
    current
}

/// 3x3 Gaussian blur with kernel `[1 2 1]^T [1 2 1] / 16` and mirrored
/// borders (the edge pixel is not repeated).
///
/// Not `image::imageops::filter3x3`: that leaves the one-pixel border
/// unfiltered and truncates the weighted sum, so edges would not blur and
/// values would drift down. Here borders reflect (reflect-101) and the
/// integer sum is rounded.
pub fn blur_3x3(src: &RgbImage) -> RgbImage {
    let (width, height) = src.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return src.clone();
    }

    let data = src.as_raw();
    let mut horizontal = vec![0u16; w * h * 3];

    for y in 0..h {
        let row = y * w * 3;
        for x in 0..w {
            let (left, right) = (reflect(x as isize - 1, w), reflect(x as isize + 1, w));
            for c in 0..3 {
                horizontal[row + x * 3 + c] = data[row + left * 3 + c] as u16
                    + 2 * data[row + x * 3 + c] as u16
                    + data[row + right * 3 + c] as u16;
            }
        }
    }

    let mut out = vec![0u8; w * h * 3];
    for y in 0..h {
        let (up, down) = (reflect(y as isize - 1, h), reflect(y as isize + 1, h));
        for i in 0..w * 3 {
            let sum = horizontal[up * w * 3 + i] as u32
                + 2 * horizontal[y * w * 3 + i] as u32
                + horizontal[down * w * 3 + i] as u32;
            out[y * w * 3 + i] = ((sum + 8) / 16) as u8;
        }
    }

    RgbImage::from_raw(width, height, out).unwrap_or_else(|| src.clone())
}

/// Mirror an out-of-range index back into `0..len` without repeating the edge.
fn reflect(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    if index < 0 {
        (-index) as usize
    } else if index > last {
        (2 * last - index) as usize
    } else {
        index as usize
    }
}
