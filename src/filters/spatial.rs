//! Spatial filter operators: sharpening, denoising, edges and pixelation

use crate::error::Result;
use crate::types::PixelGrid;
use crate::utils::color::{saturate, split_planes};
use crate::utils::filters::{
    border_index, box_sum, canny, filter3x3, gaussian_blur_plane, gaussian_blur_plane_f32, resize,
    sigma_for_kernel, Border,
};
use image::imageops::FilterType;
use ndarray::Array3;
use rayon::prelude::*;

/// Laplacian-style sharpening kernel
pub const SHARPEN_KERNEL: [[f32; 3]; 3] = [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]];

/// Non-local means template window (side)
pub const NLM_TEMPLATE_SIZE: usize = 7;
/// Non-local means search window (side)
pub const NLM_SEARCH_SIZE: usize = 21;

/// Canny thresholds for the standalone edge operator
pub const CANNY_LOW: f32 = 55.0;
pub const CANNY_HIGH: f32 = 75.0;

/// Blend the sharpened image with the original
///
/// `amount` 0 returns the original untouched, 1 returns the fully filtered
/// image, anything else is `amount * filtered + (1 - amount) * original`.
#[must_use]
pub fn sharpen(grid: &PixelGrid, amount: f32) -> PixelGrid {
    if amount == 0.0 {
        return grid.clone();
    }
    let filtered = filter3x3(grid, &SHARPEN_KERNEL);
    if (amount - 1.0).abs() < f32::EPSILON {
        return filtered;
    }

    let color_channels = if grid.has_alpha() { 3 } else { grid.channels() };
    let original = grid.as_array();
    let sharp = filtered.as_array();
    let data = Array3::from_shape_fn(original.dim(), |(y, x, c)| {
        if c >= color_channels {
            return original[[y, x, c]];
        }
        saturate(amount * f32::from(sharp[[y, x, c]]) + (1.0 - amount) * f32::from(original[[y, x, c]]))
    });
    PixelGrid::from_array_unchecked(data)
}

/// Non-local means denoising
///
/// For every pixel, candidates in the 21x21 search window are weighted by
/// `exp(-d2 / h^2)` where `d2` is the mean squared difference between the
/// 7x7 patches around the two pixels, taken over all colour channels.
/// Patch distances for each search offset come from one box sum, so the cost
/// is independent of the template size.
#[must_use]
pub fn denoise(grid: &PixelGrid, strength: f32) -> PixelGrid {
    let (h, w, channels) = (grid.height(), grid.width(), grid.channels());
    if h == 0 || w == 0 || strength <= 0.0 {
        return grid.clone();
    }
    let cn = if channels == 4 { 3 } else { channels };
    let src: Vec<f32> = grid.as_array().iter().map(|&v| f32::from(v)).collect();

    let template_radius = NLM_TEMPLATE_SIZE / 2;
    let search_radius = (NLM_SEARCH_SIZE / 2) as isize;
    let inv_h2 = 1.0 / (strength * strength);
    let patch_norm = 1.0 / ((NLM_TEMPLATE_SIZE * NLM_TEMPLATE_SIZE * cn) as f32);

    let mut acc = vec![0.0_f32; h * w * cn];
    let mut weights = vec![0.0_f32; h * w];

    for dy in -search_radius..=search_radius {
        for dx in -search_radius..=search_radius {
            let offset_index = |i: usize| -> usize {
                let (y, x) = (i / w, i % w);
                let sy = border_index(y as isize + dy, h, Border::Reflect101);
                let sx = border_index(x as isize + dx, w, Border::Reflect101);
                sy * w + sx
            };

            let sq_diff: Vec<f32> = (0..h * w)
                .into_par_iter()
                .map(|i| {
                    let j = offset_index(i);
                    (0..cn)
                        .map(|c| {
                            let d = src[i * channels + c] - src[j * channels + c];
                            d * d
                        })
                        .sum()
                })
                .collect();
            let patch = box_sum(&sq_diff, w, h, template_radius, Border::Reflect101);

            acc.par_chunks_mut(cn)
                .zip(weights.par_iter_mut())
                .enumerate()
                .for_each(|(i, (pixel, weight_sum))| {
                    let weight = (-(patch[i] * patch_norm) * inv_h2).exp();
                    let j = offset_index(i);
                    for (c, value) in pixel.iter_mut().enumerate() {
                        *value += weight * src[j * channels + c];
                    }
                    *weight_sum += weight;
                });
        }
    }

    let original = grid.as_array();
    let data = Array3::from_shape_fn((h, w, channels), |(y, x, c)| {
        if c >= cn {
            return original[[y, x, c]];
        }
        let i = y * w + x;
        saturate(acc[i * cn + c] / weights[i])
    });
    PixelGrid::from_array_unchecked(data)
}

/// Single-channel Canny edge map
///
/// The luma plane is smoothed with the sigma of a 5x5 Gaussian first.
#[must_use]
pub fn canny_edges(grid: &PixelGrid) -> PixelGrid {
    let gray = grid.to_gray_image();
    let blurred = gaussian_blur_plane(&gray, sigma_for_kernel(5));
    PixelGrid::from_gray_image(&canny(&blurred, CANNY_LOW, CANNY_HIGH))
}

/// Unsharp masking: `1.5 * image - 0.5 * blur(image, sigma = 2)`
#[must_use]
pub fn edge_enhance(grid: &PixelGrid) -> PixelGrid {
    let color_channels = if grid.has_alpha() { 3 } else { grid.channels() };
    let blurred: Vec<_> = split_planes(grid)
        .iter()
        .take(color_channels)
        .map(|plane| gaussian_blur_plane_f32(plane, 2.0))
        .collect();
    let original = grid.as_array();
    let data = Array3::from_shape_fn(original.dim(), |(y, x, c)| {
        if c >= color_channels {
            return original[[y, x, c]];
        }
        let blur = blurred[c].get_pixel(x as u32, y as u32)[0];
        saturate(1.5 * f32::from(original[[y, x, c]]) - 0.5 * blur)
    });
    PixelGrid::from_array_unchecked(data)
}

/// Blocky mosaic: shrink by `block_size` with linear filtering, grow back with nearest
///
/// # Errors
/// Propagates resize failures.
pub fn pixelate(grid: &PixelGrid, block_size: u32) -> Result<PixelGrid> {
    let (w, h) = grid.dimensions();
    if w == 0 || h == 0 {
        return Ok(grid.clone());
    }
    let block = block_size.max(1);
    let small_w = (w / block).max(1);
    let small_h = (h / block).max(1);
    let small = resize(grid, small_w, small_h, FilterType::Triangle)?;
    resize(&small, w, h, FilterType::Nearest)
}
