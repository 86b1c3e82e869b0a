//! Shared neighbourhood filters used by several operators
//!
//! Thin wrappers over `imageproc` for the stable primitives (Gaussian blur,
//! median, dilation, Canny, Sobel) plus hand-written kernels for the filters
//! that need exact border and weighting rules (3x3 convolution, bilateral,
//! box sums, adaptive mean threshold).

use crate::error::Result;
use crate::types::PixelGrid;
use crate::utils::color::{merge_planes, saturate, split_planes};
use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::Norm;
use ndarray::Array3;
use rayon::prelude::*;

/// How out-of-range coordinates are folded back into the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    /// `gfedcb|abcdefgh|gfedcba`
    Reflect101,
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
}

/// Fold `i` into `0..n` according to `border`
#[inline]
#[must_use]
pub fn border_index(i: isize, n: usize, border: Border) -> usize {
    let n_i = n as isize;
    if n <= 1 {
        return 0;
    }
    match border {
        Border::Replicate => i.clamp(0, n_i - 1) as usize,
        Border::Reflect101 => {
            let period = 2 * (n_i - 1);
            let mut j = i.rem_euclid(period);
            if j >= n_i {
                j = period - j;
            }
            j as usize
        },
    }
}

/// Gaussian sigma implied by an odd kernel size when no sigma is given
#[must_use]
pub fn sigma_for_kernel(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian blur of a single plane; non-positive sigma returns a copy
#[must_use]
pub fn gaussian_blur_plane(plane: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || !sigma.is_finite() || plane.width() == 0 || plane.height() == 0 {
        return plane.clone();
    }
    imageproc::filter::gaussian_blur_f32(plane, sigma)
}

/// Gaussian blur of a single plane kept in `f32`, without 8-bit truncation
#[must_use]
pub fn gaussian_blur_plane_f32(plane: &GrayImage, sigma: f32) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let float = ImageBuffer::from_fn(plane.width(), plane.height(), |x, y| {
        Luma([f32::from(plane.get_pixel(x, y)[0])])
    });
    if sigma <= 0.0 || !sigma.is_finite() || plane.width() == 0 || plane.height() == 0 {
        return float;
    }
    imageproc::filter::gaussian_blur_f32(&float, sigma)
}

/// Gaussian blur applied to every channel independently
#[must_use]
pub fn gaussian_blur(grid: &PixelGrid, sigma: f32) -> PixelGrid {
    let planes: Vec<GrayImage> = split_planes(grid)
        .iter()
        .map(|plane| gaussian_blur_plane(plane, sigma))
        .collect();
    merge_planes(&planes)
}

/// Median filter with an odd square kernel of side `ksize`
#[must_use]
pub fn median_plane(plane: &GrayImage, ksize: u32) -> GrayImage {
    let radius = ksize / 2;
    if radius == 0 || plane.width() == 0 || plane.height() == 0 {
        return plane.clone();
    }
    imageproc::filter::median_filter(plane, radius, radius)
}

/// Grey-level dilation with a `ksize x ksize` square
#[must_use]
pub fn dilate_plane(plane: &GrayImage, ksize: u32) -> GrayImage {
    let radius = (ksize / 2).min(u32::from(u8::MAX)) as u8;
    if radius == 0 {
        return plane.clone();
    }
    imageproc::morphology::dilate(plane, Norm::LInf, radius)
}

/// Canny edge map (255 on edges)
#[must_use]
pub fn canny(plane: &GrayImage, low: f32, high: f32) -> GrayImage {
    if plane.width() < 3 || plane.height() < 3 {
        return GrayImage::new(plane.width(), plane.height());
    }
    imageproc::edges::canny(plane, low, high)
}

/// `|dI/dx|` and `|dI/dy|` from 3x3 Sobel kernels, each saturated to `u8`
#[must_use]
pub fn abs_sobel(plane: &GrayImage) -> (GrayImage, GrayImage) {
    let gx = imageproc::gradients::horizontal_sobel(plane);
    let gy = imageproc::gradients::vertical_sobel(plane);
    let (w, h) = plane.dimensions();
    let to_abs = |x: u32, y: u32, img: &image::ImageBuffer<image::Luma<i16>, Vec<i16>>| {
        image::Luma([i32::from(img.get_pixel(x, y)[0]).unsigned_abs().min(255) as u8])
    };
    (
        GrayImage::from_fn(w, h, |x, y| to_abs(x, y, &gx)),
        GrayImage::from_fn(w, h, |x, y| to_abs(x, y, &gy)),
    )
}

/// Sum over a `(2r+1) x (2r+1)` window with the given border rule
#[must_use]
pub fn box_sum(values: &[f32], width: usize, height: usize, radius: usize, border: Border) -> Vec<f32> {
    let r = radius as isize;
    let mut horizontal = vec![0.0_f32; values.len()];
    for y in 0..height {
        let row = &values[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for dx in -r..=r {
                acc += row[border_index(x as isize + dx, width, border)];
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0_f32; values.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for dy in -r..=r {
                acc += horizontal[border_index(y as isize + dy, height, border) * width + x];
            }
            out[y * width + x] = acc;
        }
    }
    out
}

/// Adaptive threshold against the local mean of a `block x block` window
///
/// A pixel becomes 255 when it is brighter than `mean - c`, otherwise 0.
#[must_use]
pub fn adaptive_mean_threshold(plane: &GrayImage, block: u32, c: f32) -> GrayImage {
    let (w, h) = plane.dimensions();
    let values: Vec<f32> = plane.as_raw().iter().map(|&v| f32::from(v)).collect();
    let radius = (block / 2) as usize;
    let area = ((2 * radius + 1) * (2 * radius + 1)) as f32;
    let sums = box_sum(&values, w as usize, h as usize, radius, Border::Replicate);

    GrayImage::from_fn(w, h, |x, y| {
        let idx = (y * w + x) as usize;
        let mean = (sums[idx] / area).round();
        let threshold = mean - c;
        image::Luma([if values[idx] > threshold { 255 } else { 0 }])
    })
}

/// 3x3 convolution (correlation) with reflect-101 borders, saturated per channel
///
/// Alpha, when present, is copied through untouched.
#[must_use]
pub fn filter3x3(grid: &PixelGrid, kernel: &[[f32; 3]; 3]) -> PixelGrid {
    let (h, w, channels) = (grid.height(), grid.width(), grid.channels());
    let src = grid.as_array();
    let color_channels = if channels == 4 { 3 } else { channels };
    let mut out = src.clone();

    for y in 0..h {
        for x in 0..w {
            for c in 0..color_channels {
                let mut acc = 0.0_f32;
                for (ky, row) in kernel.iter().enumerate() {
                    let sy = border_index(y as isize + ky as isize - 1, h, Border::Reflect101);
                    for (kx, weight) in row.iter().enumerate() {
                        let sx = border_index(x as isize + kx as isize - 1, w, Border::Reflect101);
                        acc += weight * f32::from(src[[sy, sx, c]]);
                    }
                }
                out[[y, x, c]] = saturate(acc);
            }
        }
    }
    PixelGrid::from_array_unchecked(out)
}

/// Edge-preserving bilateral filter
///
/// `diameter` is the neighbourhood size (only offsets inside the inscribed
/// circle contribute). Colour distance is the L1 distance over the colour
/// channels; alpha is copied through. Rows are processed in parallel.
#[must_use]
pub fn bilateral_filter(grid: &PixelGrid, diameter: u32, sigma_color: f32, sigma_space: f32) -> PixelGrid {
    let (h, w, channels) = (grid.height(), grid.width(), grid.channels());
    if h == 0 || w == 0 {
        return grid.clone();
    }
    let cn = if channels == 4 { 3 } else { channels };
    let radius = (diameter / 2).max(1) as isize;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let color_weights: Vec<f32> = (0..=255 * cn)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dy * dy + dx * dx) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            offsets.push((dy, dx, (r2 * space_coeff).exp()));
        }
    }

    let src = grid.to_raw();
    let mut dst = src.clone();

    dst.par_chunks_mut(w * channels).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let center = (y * w + x) * channels;
            let mut acc = [0.0_f32; 3];
            let mut wsum = 0.0_f32;
            for &(dy, dx, space_w) in &offsets {
                let sy = border_index(y as isize + dy, h, Border::Reflect101);
                let sx = border_index(x as isize + dx, w, Border::Reflect101);
                let idx = (sy * w + sx) * channels;
                let mut dist = 0usize;
                for c in 0..cn {
                    dist += (i32::from(src[idx + c]) - i32::from(src[center + c])).unsigned_abs() as usize;
                }
                let weight = space_w * color_weights[dist];
                for c in 0..cn {
                    acc[c] += weight * f32::from(src[idx + c]);
                }
                wsum += weight;
            }
            for c in 0..cn {
                row[x * channels + c] = saturate(acc[c] / wsum);
            }
        }
    });

    PixelGrid::from_array_unchecked(
        Array3::from_shape_vec((h, w, channels), dst).unwrap_or_else(|_| grid.as_array().clone()),
    )
}

/// Stretch a plane so its minimum maps to 0 and its maximum to 255
#[must_use]
pub fn normalize_min_max(plane: &GrayImage) -> GrayImage {
    let (min, max) = plane
        .as_raw()
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max <= min {
        return GrayImage::new(plane.width(), plane.height());
    }
    let scale = 255.0 / f32::from(max - min);
    let mut out = plane.clone();
    for p in out.pixels_mut() {
        p[0] = saturate(f32::from(p[0] - min) * scale);
    }
    out
}

/// Resize to exactly `width x height`, keeping the channel layout
pub fn resize(grid: &PixelGrid, width: u32, height: u32, filter: FilterType) -> Result<PixelGrid> {
    if grid.dimensions() == (width, height) {
        return Ok(grid.clone());
    }
    let resized = grid.to_dynamic()?.resize_exact(width, height, filter);
    Ok(PixelGrid::from_dynamic(&resized))
}

/// Area-like filter when shrinking, cubic when enlarging
#[must_use]
pub fn resampling_filter(from: (u32, u32), to: (u32, u32)) -> FilterType {
    if u64::from(to.0) * u64::from(to.1) < u64::from(from.0) * u64::from(from.1) {
        FilterType::Triangle
    } else {
        FilterType::CatmullRom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_blur_keeps_flat_planes_flat() {
        let plane = GrayImage::from_pixel(12, 9, Luma([150]));
        let blurred = gaussian_blur_plane_f32(&plane, 2.0);
        assert!(blurred.pixels().all(|p| (p[0] - 150.0).abs() < 0.01));
    }

    #[test]
    fn test_border_index_reflect101() {
        assert_eq!(border_index(-1, 5, Border::Reflect101), 1);
        assert_eq!(border_index(-2, 5, Border::Reflect101), 2);
        assert_eq!(border_index(5, 5, Border::Reflect101), 3);
        assert_eq!(border_index(6, 5, Border::Reflect101), 2);
        assert_eq!(border_index(2, 5, Border::Reflect101), 2);
        assert_eq!(border_index(-3, 1, Border::Reflect101), 0);
    }

    #[test]
    fn test_border_index_replicate() {
        assert_eq!(border_index(-4, 5, Border::Replicate), 0);
        assert_eq!(border_index(9, 5, Border::Replicate), 4);
    }

    #[test]
    fn test_sigma_for_kernel() {
        assert!((sigma_for_kernel(3) - 0.8).abs() < 1e-6);
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_identity_kernel_is_noop() {
        let grid = PixelGrid::from_raw(2, 2, 3, (0..12).collect()).unwrap();
        let identity = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        assert_eq!(filter3x3(&grid, &identity), grid);
    }

    #[test]
    fn test_bilateral_keeps_flat_regions() {
        let grid = PixelGrid::filled(8, 8, &[40, 80, 120]);
        assert_eq!(bilateral_filter(&grid, 9, 75.0, 75.0), grid);
    }

    #[test]
    fn test_box_sum_of_constant() {
        let values = vec![1.0; 25];
        let sums = box_sum(&values, 5, 5, 1, Border::Reflect101);
        assert!(sums.iter().all(|&s| (s - 9.0).abs() < 1e-6));
    }

    #[test]
    fn test_adaptive_threshold_flat_is_white() {
        let plane = GrayImage::from_pixel(10, 10, image::Luma([100]));
        let out = adaptive_mean_threshold(&plane, 9, 2.0);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_normalize_min_max() {
        let plane = GrayImage::from_raw(3, 1, vec![10, 20, 30]).unwrap();
        let out = normalize_min_max(&plane);
        assert_eq!(out.as_raw(), &vec![0, 128, 255]);
    }
}
