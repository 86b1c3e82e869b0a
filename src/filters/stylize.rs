//! Artistic stylization operators
//!
//! Everything here works on the RGB content of the input; alpha is dropped
//! and grayscale inputs are promoted. Operators that need randomness take an
//! explicit RNG so callers can make them reproducible with a seed.

use crate::error::{FxError, Result};
use crate::types::PixelGrid;
use crate::utils::color::{gray_to_rgb_grid, lab_to_rgb, luma, rgb_to_lab, saturate, split_planes};
use crate::utils::filters::{
    abs_sobel, adaptive_mean_threshold, bilateral_filter, box_sum, canny, dilate_plane, gaussian_blur_plane,
    median_plane, sigma_for_kernel, Border,
};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use ndarray::Array3;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

/// Retro poster palette, darkest tone first
pub const RETRO_PALETTE: [[u8; 3]; 4] = [[0, 0, 128], [220, 20, 60], [245, 245, 220], [70, 130, 180]];

/// Neon tube colours
pub const NEON_PALETTE: [[u8; 3]; 7] = [
    [255, 0, 255],
    [0, 255, 255],
    [0, 255, 0],
    [0, 102, 255],
    [255, 165, 0],
    [255, 105, 180],
    [255, 255, 0],
];

/// Cold tint blended in by the haunted operator
pub const HAUNTED_TINT: [u8; 3] = [100, 120, 150];

const SKETCH_BLUR_KERNEL: u32 = 61;
const COLOR_SKETCH_SHADE: f32 = 0.05;
const HATCH_SPACING: usize = 10;
const KMEANS_MAX_ITER: usize = 10;
const KMEANS_EPSILON: f32 = 1.0;
const KMEANS_ATTEMPTS: usize = 2;

fn rgb_grid(grid: &PixelGrid) -> PixelGrid {
    if grid.channels() == 3 {
        return grid.clone();
    }
    PixelGrid::from_rgb_image(&grid.to_rgb_image())
}

/// Keep `color` where `mask` is set, black elsewhere
fn and_mask(color: &PixelGrid, mask: &GrayImage) -> PixelGrid {
    let src = color.as_array();
    let data = Array3::from_shape_fn(src.dim(), |(y, x, c)| {
        src[[y, x, c]] & mask.get_pixel(x as u32, y as u32)[0]
    });
    PixelGrid::from_array_unchecked(data)
}

/// Comic book look: smoothed colour under an adaptive-threshold ink mask
#[must_use]
pub fn comic(grid: &PixelGrid) -> PixelGrid {
    let color = rgb_grid(grid);
    let gray = median_plane(&color.to_gray_image(), 5);
    let edges = adaptive_mean_threshold(&gray, 9, 2.0);
    let smoothed = bilateral_filter(&color, 9, 75.0, 75.0);
    and_mask(&smoothed, &edges)
}

/// K-means colour clustering: returns per-sample labels and `k` centres
///
/// Runs `KMEANS_ATTEMPTS` times from randomly seeded centres and keeps the
/// most compact result. Each attempt stops after 10 iterations or once no centre
/// moves by more than 1.0.
pub fn kmeans<R: Rng + ?Sized>(samples: &[[f32; 3]], k: usize, rng: &mut R) -> (Vec<usize>, Vec<[f32; 3]>) {
    if samples.is_empty() || k == 0 {
        return (vec![0; samples.len()], Vec::new());
    }

    let mut best: Option<(f32, Vec<usize>, Vec<[f32; 3]>)> = None;
    for _ in 0..KMEANS_ATTEMPTS {
        let mut centers = seed_centers(samples, k, rng);
        let mut labels = vec![0usize; samples.len()];

        for _ in 0..KMEANS_MAX_ITER {
            labels
                .par_iter_mut()
                .zip(samples.par_iter())
                .for_each(|(label, sample)| *label = nearest_center(sample, &centers).0);

            let mut sums = vec![[0.0_f64; 3]; k];
            let mut counts = vec![0usize; k];
            for (sample, &label) in samples.iter().zip(&labels) {
                for c in 0..3 {
                    sums[label][c] += f64::from(sample[c]);
                }
                counts[label] += 1;
            }

            let mut max_shift = 0.0_f32;
            for (j, center) in centers.iter_mut().enumerate() {
                if counts[j] == 0 {
                    continue;
                }
                let updated = [
                    (sums[j][0] / counts[j] as f64) as f32,
                    (sums[j][1] / counts[j] as f64) as f32,
                    (sums[j][2] / counts[j] as f64) as f32,
                ];
                max_shift = max_shift.max(squared_distance(center, &updated).sqrt());
                *center = updated;
            }
            if max_shift <= KMEANS_EPSILON {
                break;
            }
        }

        let compactness: f32 = samples
            .par_iter()
            .zip(labels.par_iter_mut())
            .map(|(sample, label)| {
                let (nearest, distance) = nearest_center(sample, &centers);
                *label = nearest;
                distance
            })
            .sum();

        if best.as_ref().map_or(true, |(score, _, _)| compactness < *score) {
            best = Some((compactness, labels, centers));
        }
    }

    best.map(|(_, labels, centers)| (labels, centers))
        .unwrap_or_else(|| (vec![0; samples.len()], vec![[0.0; 3]; k]))
}

/// k-means++ seeding: each further centre is drawn with probability
/// proportional to its squared distance from the centres picked so far
fn seed_centers<R: Rng + ?Sized>(samples: &[[f32; 3]], k: usize, rng: &mut R) -> Vec<[f32; 3]> {
    let n = samples.len();
    let mut centers = vec![samples[rng.gen_range(0..n)]];
    let mut distances: Vec<f32> = samples.iter().map(|s| squared_distance(s, &centers[0])).collect();

    while centers.len() < k {
        let total: f64 = distances.iter().map(|&d| f64::from(d)).sum();
        let next = if total <= 0.0 {
            samples[rng.gen_range(0..n)]
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &d) in distances.iter().enumerate() {
                target -= f64::from(d);
                if target < 0.0 {
                    chosen = i;
                    break;
                }
            }
            samples[chosen]
        };
        for (d, s) in distances.iter_mut().zip(samples) {
            *d = d.min(squared_distance(s, &next));
        }
        centers.push(next);
    }
    centers
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|c| (a[c] - b[c]) * (a[c] - b[c])).sum()
}

fn nearest_center(sample: &[f32; 3], centers: &[[f32; 3]]) -> (usize, f32) {
    centers
        .iter()
        .enumerate()
        .map(|(j, center)| (j, squared_distance(sample, center)))
        .fold((0, f32::MAX), |acc, cur| if cur.1 < acc.1 { cur } else { acc })
}

/// Flat-shaded cartoon: k-means colours, bilateral smoothing, Sobel ink lines
#[must_use]
pub fn cartoon<R: Rng + ?Sized>(grid: &PixelGrid, k: u32, warm_tone: bool, rng: &mut R) -> PixelGrid {
    let color = rgb_grid(grid);
    let raw = color.to_raw();
    let samples: Vec<[f32; 3]> = raw
        .chunks_exact(3)
        .map(|p| [f32::from(p[0]), f32::from(p[1]), f32::from(p[2])])
        .collect();

    let (labels, centers) = kmeans(&samples, k as usize, rng);
    let palette: Vec<[u8; 3]> = centers
        .iter()
        .map(|c| [c[0].clamp(0.0, 255.0) as u8, c[1].clamp(0.0, 255.0) as u8, c[2].clamp(0.0, 255.0) as u8])
        .collect();
    let quantized_raw: Vec<u8> = labels.iter().flat_map(|&l| palette[l]).collect();
    let quantized = PixelGrid::from_array_unchecked(
        Array3::from_shape_vec((color.height(), color.width(), 3), quantized_raw)
            .unwrap_or_else(|_| color.as_array().clone()),
    );
    let smooth = bilateral_filter(&quantized, 9, 75.0, 75.0);

    let (gx, gy) = abs_sobel(&color.to_gray_image());
    let mask = GrayImage::from_fn(gx.width(), gx.height(), |x, y| {
        let edge = saturate(0.5 * f32::from(gx.get_pixel(x, y)[0]) + 0.5 * f32::from(gy.get_pixel(x, y)[0]));
        Luma([if edge > 50 { 0 } else { 255 }])
    });

    let toned = if warm_tone {
        let src = smooth.as_array();
        let data = Array3::from_shape_fn(src.dim(), |(y, x, c)| {
            let v = f32::from(src[[y, x, c]]);
            match c {
                0 => (v * 1.1).min(255.0) as u8,
                1 => (v * 1.05).min(255.0) as u8,
                _ => src[[y, x, c]],
            }
        });
        PixelGrid::from_array_unchecked(data)
    } else {
        smooth
    };
    and_mask(&toned, &mask)
}

/// Luma bin of every pixel plus the mean colour of each bin
///
/// Bins are `g * levels / 256`; empty bins have no palette entry.
#[must_use]
pub fn oil_palette(grid: &PixelGrid, levels: u32) -> (Vec<u8>, Vec<Option<[u8; 3]>>) {
    let color = rgb_grid(grid);
    let levels = levels.clamp(1, 256) as usize;
    let raw = color.to_raw();

    let mut sums = vec![[0u64; 3]; levels];
    let mut counts = vec![0u64; levels];
    let bins: Vec<u8> = raw
        .chunks_exact(3)
        .map(|p| {
            let bin = usize::from(luma(p[0], p[1], p[2])) * levels / 256;
            for c in 0..3 {
                sums[bin][c] += u64::from(p[c]);
            }
            counts[bin] += 1;
            bin as u8
        })
        .collect();

    let palette = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &n)| {
            (n > 0).then(|| [(sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8])
        })
        .collect();
    (bins, palette)
}

/// Oil painting: each pixel takes the palette colour of the most frequent
/// luma bin in its `(2 * size + 1)` square neighbourhood
///
/// Ties go to the lowest bin. Only populated bins can win, so every output
/// colour is a palette entry.
#[must_use]
pub fn oil_paint(grid: &PixelGrid, size: u32, levels: u32) -> PixelGrid {
    let (h, w) = (grid.height(), grid.width());
    let (bins, palette) = oil_palette(grid, levels);

    let mut best_count = vec![-1.0_f32; h * w];
    let mut best_bin = vec![0u8; h * w];
    for (level, entry) in palette.iter().enumerate() {
        if entry.is_none() {
            continue;
        }
        let indicator: Vec<f32> = bins.iter().map(|&b| if usize::from(b) == level { 1.0 } else { 0.0 }).collect();
        let counts = box_sum(&indicator, w, h, size as usize, Border::Reflect101);
        for (i, &count) in counts.iter().enumerate() {
            if count > best_count[i] {
                best_count[i] = count;
                best_bin[i] = level as u8;
            }
        }
    }

    let data = Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
        palette[usize::from(best_bin[y * w + x])].map_or(0, |p| p[c])
    });
    PixelGrid::from_array_unchecked(data)
}

/// Colour-dodge pencil plane: `gray * 256 / (255 - blur(255 - gray))`
fn pencil_plane(gray: &GrayImage) -> GrayImage {
    let mut inverted = gray.clone();
    for p in inverted.pixels_mut() {
        p[0] = 255 - p[0];
    }
    let blurred = gaussian_blur_plane(&inverted, sigma_for_kernel(SKETCH_BLUR_KERNEL));
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let denom = 255 - blurred.get_pixel(x, y)[0];
        if denom == 0 {
            return Luma([0]);
        }
        Luma([saturate(f32::from(gray.get_pixel(x, y)[0]) * 256.0 / f32::from(denom))])
    })
}

/// Pencil sketch with faint paper grain; single-channel output
///
/// # Errors
/// Fails only if the noise distribution cannot be built.
pub fn sketch<R: Rng + ?Sized>(grid: &PixelGrid, rng: &mut R) -> Result<PixelGrid> {
    let mut plane = pencil_plane(&grid.to_gray_image());
    let noise = Normal::new(0.0_f32, 1.0).map_err(|e| FxError::processing(format!("sketch noise: {e}")))?;
    for p in plane.pixels_mut() {
        let grain = noise.sample(rng).trunc();
        p[0] = saturate(f32::from(p[0]) + grain);
    }
    Ok(PixelGrid::from_gray_image(&plane))
}

/// Smoothed colour shaded by the pencil sketch
#[must_use]
pub fn color_sketch(grid: &PixelGrid) -> PixelGrid {
    let color = rgb_grid(grid);
    let pencil = pencil_plane(&color.to_gray_image());
    let smoothed = bilateral_filter(&color, 9, 75.0, 75.0);
    let src = smoothed.as_array();
    let data = Array3::from_shape_fn(src.dim(), |(y, x, c)| {
        let shade = f32::from(pencil.get_pixel(x as u32, y as u32)[0]) / 255.0;
        let tone = COLOR_SKETCH_SHADE + (1.0 - COLOR_SKETCH_SHADE) * shade;
        saturate(f32::from(src[[y, x, c]]) * tone)
    });
    PixelGrid::from_array_unchecked(data)
}

/// Watercolour wash: two bilateral passes and a median, edges softly darkened
#[must_use]
pub fn water_color(grid: &PixelGrid) -> PixelGrid {
    let color = rgb_grid(grid);
    let smoothed = bilateral_filter(&bilateral_filter(&color, 9, 75.0, 75.0), 9, 75.0, 75.0);
    let planes: Vec<GrayImage> = split_planes(&smoothed).iter().map(|p| median_plane(p, 5)).collect();
    let washed = crate::utils::color::merge_planes(&planes);

    let (gx, gy) = abs_sobel(&washed.to_gray_image());
    let src = washed.as_array();
    let data = Array3::from_shape_fn(src.dim(), |(y, x, c)| {
        let ax = f32::from(gx.get_pixel(x as u32, y as u32)[0]);
        let ay = f32::from(gy.get_pixel(x as u32, y as u32)[0]);
        let magnitude = (ax * ax + ay * ay).sqrt().min(255.0);
        saturate(f32::from(src[[y, x, c]]) * (1.0 - 0.3 * magnitude / 255.0))
    });
    PixelGrid::from_array_unchecked(data)
}

/// Four-tone poster: posterized LAB lightness mapped onto [`RETRO_PALETTE`]
#[must_use]
pub fn retro(grid: &PixelGrid, levels: u32) -> PixelGrid {
    let color = rgb_grid(grid);
    let step = 256.0 / levels.max(1) as f32;
    let tone_step = 256 / RETRO_PALETTE.len();
    let src = color.as_array();
    let (h, w) = (color.height(), color.width());

    let mut data = Array3::<u8>::zeros((h, w, 3));
    for y in 0..h {
        for x in 0..w {
            let (l, a, b) = rgb_to_lab(src[[y, x, 0]], src[[y, x, 1]], src[[y, x, 2]]);
            let posterized = (f32::from(saturate(l)) / step).floor() * step;
            let (r, g, bb) = lab_to_rgb(posterized, a, b);
            let tone = (usize::from(luma(r, g, bb)) / tone_step).min(RETRO_PALETTE.len() - 1);
            for c in 0..3 {
                data[[y, x, c]] = RETRO_PALETTE[tone][c];
            }
        }
    }
    PixelGrid::from_array_unchecked(data)
}

/// Halftone: one black dot per block, larger where the block is darker
#[must_use]
pub fn dot(grid: &PixelGrid, block_size: u32) -> PixelGrid {
    let gray = grid.to_gray_image();
    let (w, h) = gray.dimensions();
    let block = block_size.max(1);
    let mut canvas = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));

    for by in (0..h).step_by(block as usize) {
        for bx in (0..w).step_by(block as usize) {
            let (mut sum, mut n) = (0u64, 0u64);
            for y in by..(by + block).min(h) {
                for x in bx..(bx + block).min(w) {
                    sum += u64::from(gray.get_pixel(x, y)[0]);
                    n += 1;
                }
            }
            let mean = sum as f32 / n as f32;
            let radius = ((1.0 - mean / 255.0) * (block / 2) as f32) as i32;
            if radius > 0 {
                let center = ((bx + block / 2) as i32, (by + block / 2) as i32);
                draw_filled_circle_mut(&mut canvas, center, radius, Rgb([0, 0, 0]));
            }
        }
    }
    PixelGrid::from_rgb_image(&canvas)
}

fn hatch_texture(width: u32, height: u32) -> GrayImage {
    let mut hatch = GrayImage::from_pixel(width, height, Luma([255]));
    let (w, h) = (width as i64, height as i64);
    for i in (0..w + h).step_by(HATCH_SPACING) {
        draw_line_segment_mut(&mut hatch, (i as f32, 0.0), ((i - h) as f32, h as f32), Luma([0]));
    }
    for i in (-h..w).step_by(HATCH_SPACING) {
        draw_line_segment_mut(&mut hatch, (i as f32, 0.0), ((i + h) as f32, h as f32), Luma([0]));
    }
    hatch
}

/// Thread sketch: cross-hatched shadows under inverted Canny outlines
#[must_use]
pub fn thread(grid: &PixelGrid, blur_level: u32, shadow_threshold: u8, line_thickness: u32) -> PixelGrid {
    let blurred = median_plane(&grid.to_gray_image(), blur_level);
    let (w, h) = blurred.dimensions();
    let hatch = hatch_texture(w, h);

    let mut edges = canny(&blurred, 50.0, 150.0);
    if line_thickness > 1 {
        edges = dilate_plane(&edges, line_thickness);
    }

    let sketch = GrayImage::from_fn(w, h, |x, y| {
        let shading = if blurred.get_pixel(x, y)[0] < shadow_threshold {
            hatch.get_pixel(x, y)[0]
        } else {
            255
        };
        Luma([shading & !edges.get_pixel(x, y)[0]])
    });
    gray_to_rgb_grid(&sketch)
}

/// Neon tubes: glowing edges in a random palette colour on black
#[must_use]
pub fn neon<R: Rng + ?Sized>(grid: &PixelGrid, line_thickness: u32, glow_strength: u32, rng: &mut R) -> PixelGrid {
    let tint = NEON_PALETTE[rng.gen_range(0..NEON_PALETTE.len())];
    let blurred = median_plane(&grid.to_gray_image(), 5);
    let mut edges = canny(&blurred, 50.0, 150.0);
    if line_thickness > 1 {
        edges = dilate_plane(&edges, line_thickness);
    }

    let (w, h) = edges.dimensions();
    let mut canvas = Array3::<u8>::zeros((h as usize, w as usize, 3));
    let layers = [(glow_strength * 4 + 1, 0.3_f32), (glow_strength * 2 + 1, 0.5), (glow_strength + 1, 1.0)];
    for (ksize, intensity) in layers {
        let glow = gaussian_blur_plane(&edges, sigma_for_kernel(ksize));
        for ((y, x, c), value) in canvas.indexed_iter_mut() {
            let g = f32::from(glow.get_pixel(x as u32, y as u32)[0]);
            let layer = (g * f32::from(tint[c]) / 255.0 * intensity) as u8;
            *value = value.saturating_add(layer);
        }
    }

    for ((y, x, _), value) in canvas.indexed_iter_mut() {
        if edges.get_pixel(x as u32, y as u32)[0] != 0 {
            *value = 255;
        }
    }
    PixelGrid::from_array_unchecked(canvas)
}

/// Peak-normalized 1D Gaussian profile of length `n`
fn vignette_profile(n: usize, strength: f32) -> Vec<f32> {
    let mut sigma = (n as f32 / 2.0 / strength).floor();
    if sigma <= 0.0 {
        sigma = sigma_for_kernel(n as u32);
    }
    let center = (n as f32 - 1.0) / 2.0;
    let raw: Vec<f32> = (0..n)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let peak = raw.iter().copied().fold(0.0_f32, f32::max);
    if peak <= 0.0 {
        return vec![1.0; n];
    }
    raw.into_iter().map(|v| v / peak).collect()
}

/// Haunted photo: cold fog, film grain, dark vignette
///
/// # Errors
/// Fails only if the grain distribution cannot be built.
pub fn haunted<R: Rng + ?Sized>(
    grid: &PixelGrid,
    fog_density: f32,
    vignette_strength: f32,
    grain_amount: f32,
    rng: &mut R,
) -> Result<PixelGrid> {
    let color = rgb_grid(grid);
    let (h, w) = (color.height(), color.width());
    let grain = if grain_amount > 0.0 {
        Some(Normal::new(0.0_f32, grain_amount).map_err(|e| FxError::processing(format!("haunted grain: {e}")))?)
    } else {
        None
    };
    let vx = vignette_profile(w, vignette_strength);
    let vy = vignette_profile(h, vignette_strength);

    let src = color.as_array();
    let mut data = Array3::<u8>::zeros((h, w, 3));
    for ((y, x, c), value) in data.indexed_iter_mut() {
        let fogged = saturate(
            f32::from(src[[y, x, c]]) * (1.0 - fog_density) + f32::from(HAUNTED_TINT[c]) * fog_density,
        );
        let noise = grain.as_ref().map_or(0.0, |n| n.sample(rng).trunc());
        let grained = (f32::from(fogged) + noise).clamp(0.0, 255.0);
        *value = (grained * vy[y] * vx[x]) as u8;
    }
    Ok(PixelGrid::from_array_unchecked(data))
}

/// Frosted glass: interior pixels copy a random neighbour within `radius`
#[must_use]
pub fn frost<R: Rng + ?Sized>(grid: &PixelGrid, radius: u32, rng: &mut R) -> PixelGrid {
    let (h, w) = (grid.height(), grid.width());
    let r = radius as usize;
    let src = grid.as_array();
    if r == 0 || h <= 2 * r || w <= 2 * r {
        return grid.clone();
    }
    let mut out = src.clone();

    let ri = radius as isize;
    for y in r..h - r {
        for x in r..w - r {
            let sy = (y as isize + rng.gen_range(-ri..ri)) as usize;
            let sx = (x as isize + rng.gen_range(-ri..ri)) as usize;
            for c in 0..grid.channels() {
                out[[y, x, c]] = src[[sy, sx, c]];
            }
        }
    }
    PixelGrid::from_array_unchecked(out)
}

fn edge_sign(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    (p.0 - b.0) * (a.1 - b.1) - (a.0 - b.0) * (p.1 - b.1)
}

fn in_triangle(p: (f32, f32), a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> bool {
    let d1 = edge_sign(p, a, b);
    let d2 = edge_sign(p, b, c);
    let d3 = edge_sign(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Kaleidoscope: one triangular wedge reflected around the centre
///
/// The source is the wedge of half-angle `180 / segments` degrees on the
/// positive x axis, clipped to a triangle of radius `min(cx, cy)`. Every output
/// pixel folds its polar angle into `[0, 180 / segments]` by mirroring across
/// each wedge boundary, so neighbouring copies are mirror images and the result
/// is symmetric under rotation by `360 / segments` degrees. Pixels folding
/// outside the triangle are black.
#[must_use]
pub fn kaleidoscope(grid: &PixelGrid, segments: u32) -> PixelGrid {
    let color = rgb_grid(grid);
    let (h, w) = (color.height(), color.width());
    let segments = segments.max(1);
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let radius = cx.min(cy);
    let half = std::f32::consts::PI / segments as f32;

    let apex = (cx, cy);
    let p1 = (cx + radius * (-half).cos(), cy + radius * (-half).sin());
    let p2 = (cx + radius * half.cos(), cy + radius * half.sin());
    let mask: Vec<bool> = (0..h * w)
        .map(|i| in_triangle(((i % w) as f32, (i / w) as f32), apex, p1, p2))
        .collect();

    // Bilinear sample restricted to masked pixels, renormalized at the wedge edge
    let src = color.as_array();
    let sample = |qx: f32, qy: f32| -> [f32; 3] {
        let (x0, y0) = (qx.floor(), qy.floor());
        let (fx, fy) = (qx - x0, qy - y0);
        let (mut acc, mut weight) = ([0.0f32; 3], 0.0f32);
        for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
            for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
                let (xi, yi) = (x0 as isize + dx, y0 as isize + dy);
                if xi < 0 || yi < 0 || xi >= w as isize || yi >= h as isize {
                    continue;
                }
                let (xi, yi) = (xi as usize, yi as usize);
                if mask[yi * w + xi] && wx * wy > 0.0 {
                    for (c, slot) in acc.iter_mut().enumerate() {
                        *slot += wx * wy * f32::from(src[[yi, xi, c]]);
                    }
                    weight += wx * wy;
                }
            }
        }
        if weight > 0.0 {
            acc.map(|v| v / weight)
        } else {
            [0.0; 3]
        }
    };

    let mut data = Array3::<u8>::zeros((h, w, 3));
    for y in 0..h {
        for x in 0..w {
            let (px, py) = (x as f32 - cx, y as f32 - cy);
            let r = px.hypot(py);
            let angle = py.atan2(px).rem_euclid(std::f32::consts::TAU);
            let local = angle.rem_euclid(2.0 * half);
            let folded = if local > half { 2.0 * half - local } else { local };
            let (qx, qy) = (cx + r * folded.cos(), cy + r * folded.sin());
            if !in_triangle((qx, qy), apex, p1, p2) {
                continue;
            }
            let rgb = sample(qx, qy);
            for (c, v) in rgb.into_iter().enumerate() {
                data[[y, x, c]] = saturate(v);
            }
        }
    }
    PixelGrid::from_array_unchecked(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn scene(h: usize, w: usize) -> PixelGrid {
        let data = Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
            let base = if x < w / 2 { 40 } else { 210 };
            let stripe = if (y / 6) % 2 == 0 { 0 } else { 30 };
            (base + stripe + c * 5).min(255) as u8
        });
        PixelGrid::new(data).unwrap()
    }

    #[test]
    fn test_comic_flat_region_keeps_color() {
        let grid = PixelGrid::filled(20, 20, &[30, 60, 90]);
        assert_eq!(comic(&grid), grid);
    }

    #[test]
    fn test_kmeans_separates_two_clusters() {
        let mut samples = vec![[10.0, 10.0, 10.0]; 50];
        samples.extend(vec![[240.0, 240.0, 240.0]; 50]);
        let mut rng = StdRng::seed_from_u64(7);
        let (labels, centers) = kmeans(&samples, 2, &mut rng);
        assert_eq!(centers.len(), 2);
        assert_ne!(labels[0], labels[99]);
        assert!(labels[..50].iter().all(|&l| l == labels[0]));
    }

    #[test]
    fn test_cartoon_is_reproducible_with_seed() {
        let grid = scene(24, 24);
        let a = cartoon(&grid, 4, true, &mut StdRng::seed_from_u64(3));
        let b = cartoon(&grid, 4, true, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert_eq!(a.dimensions(), (24, 24));
    }

    #[test]
    fn test_oil_paint_uses_only_palette_colors() {
        let grid = scene(30, 40);
        let (_, palette) = oil_palette(&grid, 8);
        let allowed: HashSet<[u8; 3]> = palette.iter().flatten().copied().collect();
        assert!(allowed.len() <= 8);

        let out = oil_paint(&grid, 3, 8);
        for y in 0..30 {
            for x in 0..40 {
                let px = [out.get(y, x, 0), out.get(y, x, 1), out.get(y, x, 2)];
                assert!(allowed.contains(&px), "{px:?} not in palette");
            }
        }
    }

    #[test]
    fn test_sketch_is_single_channel() {
        let out = sketch(&scene(16, 16), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(out.channels(), 1);
        assert_eq!(out.dimensions(), (16, 16));
    }

    #[test]
    fn test_retro_only_palette_colors() {
        let out = retro(&scene(12, 12), 4);
        let allowed: HashSet<[u8; 3]> = RETRO_PALETTE.iter().copied().collect();
        for y in 0..12 {
            for x in 0..12 {
                assert!(allowed.contains(&[out.get(y, x, 0), out.get(y, x, 1), out.get(y, x, 2)]));
            }
        }
    }

    #[test]
    fn test_dot_white_input_stays_white() {
        let grid = PixelGrid::filled(16, 16, &[255, 255, 255]);
        assert_eq!(dot(&grid, 8), grid);
    }

    #[test]
    fn test_dot_black_input_has_dots() {
        let out = dot(&PixelGrid::filled(16, 16, &[0, 0, 0]), 8);
        assert_eq!(out.get(4, 4, 0), 0);
        assert_eq!(out.get(0, 0, 0), 255);
    }

    #[test]
    fn test_thread_bright_flat_image_is_white() {
        let grid = PixelGrid::filled(20, 20, &[250, 250, 250]);
        let out = thread(&grid, 5, 100, 1);
        assert_eq!(out.channels(), 3);
        assert!(out.as_array().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_neon_flat_image_is_black() {
        let grid = PixelGrid::filled(20, 20, &[90, 90, 90]);
        let out = neon(&grid, 3, 5, &mut StdRng::seed_from_u64(9));
        assert!(out.as_array().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_haunted_center_keeps_fogged_tone_without_grain() {
        let grid = PixelGrid::filled(21, 21, &[200, 200, 200]);
        let out = haunted(&grid, 0.5, 1.5, 0.0, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(out.get(10, 10, 0), 150);
        assert!(out.get(0, 0, 0) < out.get(10, 10, 0));
    }

    #[test]
    fn test_frost_keeps_border_and_palette() {
        let grid = scene(20, 20);
        let out = frost(&grid, 3, &mut StdRng::seed_from_u64(5));
        for x in 0..20 {
            for c in 0..3 {
                assert_eq!(out.get(0, x, c), grid.get(0, x, c));
            }
        }
    }

    fn rotation_agreement(out: &PixelGrid, segments: u32, tolerance: i32) -> (usize, usize) {
        let size = out.width();
        let c = size as f32 / 2.0;
        let step = (360.0 / segments as f32).to_radians();
        let (mut checked, mut agreeing) = (0usize, 0usize);
        for y in 0..size {
            for x in 0..size {
                let (dx, dy) = (x as f32 - c, y as f32 - c);
                if dx.hypot(dy) > 0.6 * c {
                    continue;
                }
                let rx = (c + dx * step.cos() - dy * step.sin()).round();
                let ry = (c + dx * step.sin() + dy * step.cos()).round();
                if rx < 0.0 || ry < 0.0 || rx >= size as f32 || ry >= size as f32 {
                    continue;
                }
                checked += 1;
                let close = (0..3).all(|ch| {
                    let a = i32::from(out.get(y, x, ch));
                    let b = i32::from(out.get(ry as usize, rx as usize, ch));
                    (a - b).abs() <= tolerance
                });
                if close {
                    agreeing += 1;
                }
            }
        }
        (checked, agreeing)
    }

    #[test]
    fn test_kaleidoscope_rotation_invariance_on_uniform_input() {
        let grid = PixelGrid::filled(81, 81, &[100, 100, 100]);
        let (checked, agreeing) = rotation_agreement(&kaleidoscope(&grid, 6), 6, 16);
        assert!(checked > 0);
        assert!(agreeing * 100 >= checked * 85, "{agreeing}/{checked}");
    }

    #[test]
    fn test_kaleidoscope_rotation_invariance_on_textured_input() {
        let size = 81;
        let data = Array3::from_shape_fn((size, size, 3), |(y, x, c)| {
            let (fx, fy) = (x as f32, y as f32);
            let v = 128.0 + 50.0 * (fx / 9.0 + c as f32).sin() + 30.0 * (fy / 6.0).cos() + 0.3 * fx;
            v.clamp(0.0, 255.0) as u8
        });
        let grid = PixelGrid::new(data).unwrap();
        for segments in [4, 6, 7] {
            let out = kaleidoscope(&grid, segments);
            let (checked, agreeing) = rotation_agreement(&out, segments, 16);
            assert!(checked > 0);
            assert!(
                agreeing * 100 >= checked * 90,
                "segments={segments}: {agreeing}/{checked}"
            );
        }
    }

    #[test]
    fn test_frost_zero_radius_is_identity() {
        let grid = scene(10, 10);
        assert_eq!(frost(&grid, 0, &mut StdRng::seed_from_u64(1)), grid);
    }
}
