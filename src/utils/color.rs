//! 8-bit colour-space conversions and channel plumbing
//!
//! HSV and LAB follow the usual 8-bit storage conventions: hue is halved to
//! fit `0..180`, saturation and value span `0..=255`; LAB stores `L * 255 / 100`
//! with `a` and `b` offset by 128. All conversions assume sRGB with a D65 white
//! point.

use crate::types::PixelGrid;
use image::GrayImage;
use ndarray::Array3;
use std::sync::OnceLock;

const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;
const LAB_EPSILON: f32 = 0.008_856;

/// Round and clamp to the `u8` range
#[inline]
#[must_use]
pub fn saturate(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// BT.601 luma with 14-bit fixed point weights
#[inline]
#[must_use]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = (u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868 + 8192) >> 14;
    y.min(255) as u8
}

/// RGB to 8-bit HSV
#[must_use]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if (v - rf).abs() < f32::EPSILON {
        60.0 * (gf - bf) / diff
    } else if (v - gf).abs() < f32::EPSILON {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h8 = (h / 2.0).round() as u32 % 180;
    (h8 as u8, saturate(s), v as u8)
}

/// 8-bit HSV back to RGB
#[must_use]
pub fn hsv_to_rgb(h: u8, s: u8, v: u8) -> (u8, u8, u8) {
    let s = f32::from(s) / 255.0;
    let v = f32::from(v) / 255.0;
    if s == 0.0 {
        let c = saturate(v * 255.0);
        return (c, c, c);
    }

    let hue = (f32::from(h) * 2.0) % 360.0 / 60.0;
    let sector = hue.floor();
    let frac = hue - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * frac);
    let t = v * (1.0 - s * (1.0 - frac));

    let (r, g, b) = match sector as u32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    (saturate(r * 255.0), saturate(g * 255.0), saturate(b * 255.0))
}

fn srgb_to_linear_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0_f32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *slot = if c <= 0.040_45 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    })
}

fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    let cube = f * f * f;
    if cube > LAB_EPSILON {
        cube
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

/// RGB to LAB on the 8-bit scale (`L * 255 / 100`, `a + 128`, `b + 128`)
///
/// Values stay unquantized; callers round only where they need 8-bit planes.
#[must_use]
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let table = srgb_to_linear_table();
    let (rl, gl, bl) = (table[r as usize], table[g as usize], table[b as usize]);

    let x = (0.412_453 * rl + 0.357_580 * gl + 0.180_423 * bl) / WHITE_X;
    let y = 0.212_671 * rl + 0.715_160 * gl + 0.072_169 * bl;
    let z = (0.019_334 * rl + 0.119_193 * gl + 0.950_227 * bl) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > LAB_EPSILON {
        116.0 * fy - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);

    (l * 255.0 / 100.0, a + 128.0, bb + 128.0)
}

/// LAB on the 8-bit scale back to RGB, inverse of [`rgb_to_lab`]
#[must_use]
pub fn lab_to_rgb(l: f32, a: f32, b: f32) -> (u8, u8, u8) {
    let l = l * 100.0 / 255.0;
    let a = a - 128.0;
    let bb = b - 128.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - bb / 200.0;

    let y = if l > 903.3 * LAB_EPSILON {
        fy * fy * fy
    } else {
        l / 903.3
    };
    let x = lab_f_inv(fx) * WHITE_X;
    let z = lab_f_inv(fz) * WHITE_Z;

    let rl = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let gl = -0.969_256 * x + 1.875_991 * y + 0.041_556 * z;
    let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

    (
        saturate(linear_to_srgb(rl) * 255.0),
        saturate(linear_to_srgb(gl) * 255.0),
        saturate(linear_to_srgb(bl) * 255.0),
    )
}

/// Apply a per-pixel RGB transform, preserving alpha and grayscale layout
///
/// Grayscale grids are promoted to RGB before the closure runs.
#[must_use]
pub fn map_rgb<F>(grid: &PixelGrid, f: F) -> PixelGrid
where
    F: Fn(u8, u8, u8) -> (u8, u8, u8),
{
    let (h, w) = (grid.height(), grid.width());
    let src = grid.as_array();
    let channels = if grid.has_alpha() { 4 } else { 3 };
    let mut out = Array3::<u8>::zeros((h, w, channels));
    for y in 0..h {
        for x in 0..w {
            let (r, g, b) = if grid.channels() == 1 {
                let v = src[[y, x, 0]];
                (v, v, v)
            } else {
                (src[[y, x, 0]], src[[y, x, 1]], src[[y, x, 2]])
            };
            let (nr, ng, nb) = f(r, g, b);
            out[[y, x, 0]] = nr;
            out[[y, x, 1]] = ng;
            out[[y, x, 2]] = nb;
            if channels == 4 {
                out[[y, x, 3]] = src[[y, x, 3]];
            }
        }
    }
    PixelGrid::from_array_unchecked(out)
}

/// Split a grid into one plane per channel
#[must_use]
pub fn split_planes(grid: &PixelGrid) -> Vec<GrayImage> {
    let (w, h) = grid.dimensions();
    (0..grid.channels())
        .map(|c| GrayImage::from_fn(w, h, |x, y| image::Luma([grid.get(y as usize, x as usize, c)])))
        .collect()
}

/// Merge equally sized planes into one grid
#[must_use]
pub fn merge_planes(planes: &[GrayImage]) -> PixelGrid {
    let (w, h) = planes.first().map_or((0, 0), GrayImage::dimensions);
    let out = Array3::from_shape_fn((h as usize, w as usize, planes.len()), |(y, x, c)| {
        planes[c].get_pixel(x as u32, y as u32)[0]
    });
    PixelGrid::from_array_unchecked(out)
}

/// Replicate a single plane into a 3-channel grid
#[must_use]
pub fn gray_to_rgb_grid(gray: &GrayImage) -> PixelGrid {
    let (w, h) = gray.dimensions();
    let out = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, _)| {
        gray.get_pixel(x as u32, y as u32)[0]
    });
    PixelGrid::from_array_unchecked(out)
}
