//! Colour-space and tone operators
//!
//! Pointwise or plane-wise adjustments: luma extraction, inversion, HSV
//! brightness and saturation work, LAB contrast equalization and
//! background-normalizing shadow removal. All of them keep the input's
//! height and width.

use crate::types::PixelGrid;
use crate::utils::clahe::clahe;
use crate::utils::color::{
    gray_to_rgb_grid, hsv_to_rgb, lab_to_rgb, map_rgb, merge_planes, rgb_to_hsv, rgb_to_lab,
    saturate, split_planes,
};
use crate::utils::filters::{dilate_plane, median_plane, normalize_min_max};
use image::GrayImage;
use ndarray::Array3;

/// CLAHE clip limit used for contrast enhancement
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;
/// CLAHE tile grid (per side)
pub const CLAHE_TILES: usize = 8;

/// Collapse to a single luma channel
///
/// # Examples
/// ```rust
/// use lumafx::{filters::tone, PixelGrid};
///
/// let red = PixelGrid::filled(4, 4, &[255, 0, 0]);
/// let gray = tone::grayscale(&red);
/// assert_eq!(gray.channels(), 1);
/// assert_eq!(gray.get(0, 0, 0), 76);
/// ```
#[must_use]
pub fn grayscale(grid: &PixelGrid) -> PixelGrid {
    if grid.channels() == 1 {
        return grid.clone();
    }
    PixelGrid::from_gray_image(&grid.to_gray_image())
}

/// Bitwise complement of every sample, alpha included
#[must_use]
pub fn invert(grid: &PixelGrid) -> PixelGrid {
    PixelGrid::from_array_unchecked(grid.as_array().mapv(|v| !v))
}

/// Scale HSV value so its mean approaches `target`
///
/// A completely black image has `target` added instead, since no scale can
/// lift a zero mean.
#[must_use]
pub fn auto_brightness(grid: &PixelGrid, target: u8) -> PixelGrid {
    let (h, w) = (grid.height(), grid.width());
    if h == 0 || w == 0 {
        return grid.clone();
    }

    let rgb = grid.to_rgb_image();
    let total: u64 = rgb
        .pixels()
        .map(|p| u64::from(p[0].max(p[1]).max(p[2])))
        .sum();
    let mean_v = total as f64 / (h * w) as f64;

    let target_f = f64::from(target);
    map_rgb(grid, |r, g, b| {
        let (hh, s, v) = rgb_to_hsv(r, g, b);
        let new_v = if mean_v == 0.0 {
            (f64::from(v) + target_f).min(255.0) as u8
        } else {
            (f64::from(v) * target_f / mean_v).clamp(0.0, 255.0) as u8
        };
        hsv_to_rgb(hh, s, new_v)
    })
}

/// CLAHE on the LAB lightness channel, chroma untouched
///
/// Backs both the auto-enhance and contrast-adjust operators.
#[must_use]
pub fn clahe_enhance(grid: &PixelGrid) -> PixelGrid {
    let (w, h) = grid.dimensions();
    if grid.channels() == 1 {
        let gray = grid.to_gray_image();
        return PixelGrid::from_gray_image(&clahe(&gray, CLAHE_TILES, CLAHE_TILES, CLAHE_CLIP_LIMIT));
    }

    let rgb = grid.to_rgb_image();
    let mut lab = Vec::with_capacity((w * h) as usize);
    let lightness = GrayImage::from_fn(w, h, |x, y| {
        let p = rgb.get_pixel(x, y);
        let (l, a, b) = rgb_to_lab(p[0], p[1], p[2]);
        lab.push((a, b));
        image::Luma([saturate(l)])
    });
    let equalized = clahe(&lightness, CLAHE_TILES, CLAHE_TILES, CLAHE_CLIP_LIMIT);

    let src = grid.as_array();
    let channels = grid.channels();
    let data = Array3::from_shape_fn((h as usize, w as usize, channels), |(y, x, c)| {
        if c == 3 {
            return src[[y, x, 3]];
        }
        let (a, b) = lab[y * w as usize + x];
        let l = equalized.get_pixel(x as u32, y as u32)[0];
        let (r, g, bb) = lab_to_rgb(f32::from(l), a, b);
        [r, g, bb][c]
    });
    PixelGrid::from_array_unchecked(data)
}

/// Flatten uneven illumination plane by plane
///
/// Each colour plane's background is estimated with a 7x7 dilation followed
/// by a 21x21 median; the plane becomes `255 - |plane - background|`,
/// stretched to the full range. Alpha passes through.
#[must_use]
pub fn shadow_removal(grid: &PixelGrid) -> PixelGrid {
    let mut planes = split_planes(grid);
    let color_planes = if grid.has_alpha() { 3 } else { planes.len() };

    for plane in planes.iter_mut().take(color_planes) {
        let background = median_plane(&dilate_plane(plane, 7), 21);
        let mut diff = plane.clone();
        for (d, bg) in diff.pixels_mut().zip(background.pixels()) {
            d[0] = 255 - d[0].abs_diff(bg[0]);
        }
        *plane = normalize_min_max(&diff);
    }
    merge_planes(&planes)
}

/// Negative-film look: inverted luma with boosted contrast, as 3 channels
///
/// Each inverted sample becomes `|1.7 * v - 10|`, saturated.
#[must_use]
pub fn xray(grid: &PixelGrid) -> PixelGrid {
    let mut gray = grid.to_gray_image();
    for p in gray.pixels_mut() {
        let inverted = f32::from(255 - p[0]);
        p[0] = saturate((1.7 * inverted - 10.0).abs());
    }
    gray_to_rgb_grid(&gray)
}

/// Saturation equalization plus a 20% value boost
#[must_use]
pub fn heat(grid: &PixelGrid) -> PixelGrid {
    let rgb = grid.to_rgb_image();
    let (w, h) = rgb.dimensions();
    let hsv: Vec<(u8, u8, u8)> = rgb.pixels().map(|p| rgb_to_hsv(p[0], p[1], p[2])).collect();

    let saturation = GrayImage::from_fn(w, h, |x, y| image::Luma([hsv[(y * w + x) as usize].1]));
    let equalized = if w == 0 || h == 0 {
        saturation
    } else {
        imageproc::contrast::equalize_histogram(&saturation)
    };

    let data = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
        let (hh, _, v) = hsv[y * w as usize + x];
        let s = equalized.get_pixel(x as u32, y as u32)[0];
        let boosted = (f32::from(v) * 1.2).min(255.0) as u8;
        let (r, g, b) = hsv_to_rgb(hh, s, boosted);
        [r, g, b][c]
    });
    PixelGrid::from_array_unchecked(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(h: usize, w: usize) -> PixelGrid {
        let data = Array3::from_shape_fn((h, w, 3), |(y, x, c)| ((x * 5 + y * 3 + c * 40) % 256) as u8);
        PixelGrid::new(data).unwrap()
    }

    #[test]
    fn test_grayscale_of_red_is_76() {
        let red = PixelGrid::filled(100, 100, &[255, 0, 0]);
        let gray = grayscale(&red);
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.dimensions(), (100, 100));
        assert!(gray.as_array().iter().all(|&v| v == 76));
    }

    #[test]
    fn test_invert_red_is_cyan() {
        let red = PixelGrid::filled(100, 100, &[255, 0, 0]);
        let inverted = invert(&red);
        assert_eq!(inverted, PixelGrid::filled(100, 100, &[0, 255, 255]));
    }

    #[test]
    fn test_invert_is_involution() {
        let grid = gradient(17, 23);
        assert_eq!(invert(&invert(&grid)), grid);
    }

    #[test]
    fn test_auto_brightness_black_adds_target() {
        let black = PixelGrid::filled(5, 5, &[0, 0, 0]);
        let out = auto_brightness(&black, 128);
        assert!(out.as_array().iter().all(|&v| v == 128));
    }

    #[test]
    fn test_auto_brightness_moves_mean_towards_target() {
        let dark = PixelGrid::filled(6, 6, &[40, 20, 10]);
        let out = auto_brightness(&dark, 128);
        let max_channel = (0..3).map(|c| out.get(0, 0, c)).max().unwrap();
        assert!((i32::from(max_channel) - 128).abs() <= 2);
    }

    #[test]
    fn test_clahe_enhance_keeps_shape_and_alpha() {
        let data = Array3::from_shape_fn((20, 30, 4), |(y, x, c)| if c == 3 { 77 } else { ((x + y) * 4) as u8 });
        let grid = PixelGrid::new(data).unwrap();
        let out = clahe_enhance(&grid);
        assert_eq!(out.dimensions(), (30, 20));
        assert_eq!(out.channels(), 4);
        assert!((0..20).all(|y| out.get(y, 0, 3) == 77));
    }

    #[test]
    fn test_shadow_removal_uniform_plane_stays_defined() {
        let grid = PixelGrid::filled(30, 30, &[120, 60, 200]);
        let out = shadow_removal(&grid);
        assert_eq!(out.dimensions(), (30, 30));
        assert_eq!(out.channels(), 3);
    }

    #[test]
    fn test_xray_values() {
        let black = PixelGrid::filled(2, 2, &[0, 0, 0]);
        let out = xray(&black);
        assert_eq!(out.channels(), 3);
        assert!(out.as_array().iter().all(|&v| v == 255));

        let white = PixelGrid::filled(2, 2, &[255]);
        assert!(xray(&white).as_array().iter().all(|&v| v == 10));
    }

    #[test]
    fn test_heat_keeps_dimensions() {
        let grid = gradient(12, 9);
        let out = heat(&grid);
        assert_eq!(out.dimensions(), (9, 12));
        assert_eq!(out.channels(), 3);
    }
}
