//! Foreground segmentation and the operators built on it
//!
//! [`GrabCut`] separates a centred subject from its surroundings by
//! alternating colour-model fitting with a graph min-cut. The image is
//! downscaled before segmentation and the mask upscaled afterwards, so cost
//! is bounded regardless of input size.

mod gmm;
mod graph;

pub use gmm::{Gmm, COMPONENTS};
pub use graph::FlowGraph;

use crate::error::Result;
use crate::types::{PixelGrid, SegmentationMask};
use crate::utils::filters::{gaussian_blur, resize, sigma_for_kernel};
use image::imageops::FilterType;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// Smoothness weight of neighbour links
pub const GAMMA: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    /// Outside the seed rectangle, never relabelled
    Background,
    ProbableBackground,
    ProbableForeground,
}

impl Label {
    fn is_foreground(self) -> bool {
        self == Self::ProbableForeground
    }

    fn is_probable(self) -> bool {
        self != Self::Background
    }
}

/// Segmentation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrabCutConfig {
    /// Largest side the image is shrunk to before segmenting
    pub max_dimension: u32,
    /// Inset of the seed rectangle, in percent of each side
    pub padding_percent: f32,
    /// Model refinement rounds
    pub iterations: u32,
}

impl Default for GrabCutConfig {
    fn default() -> Self {
        Self {
            max_dimension: 256,
            padding_percent: 5.0,
            iterations: 5,
        }
    }
}

/// Seed rectangle `[x0, x1) x [y0, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl SeedRect {
    /// Rectangle inset by `padding_percent` of each side, at least one pixel
    #[must_use]
    pub fn inset(width: usize, height: usize, padding_percent: f32) -> Self {
        let pad_x = ((width as f32 * padding_percent / 100.0) as usize).max(1);
        let pad_y = ((height as f32 * padding_percent / 100.0) as usize).max(1);
        Self {
            x0: pad_x,
            y0: pad_y,
            x1: width.saturating_sub(pad_x),
            y1: height.saturating_sub(pad_y),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    #[must_use]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Rectangle-seeded iterative graph-cut segmentation
#[derive(Debug, Clone, Copy, Default)]
pub struct GrabCut {
    config: GrabCutConfig,
}

impl GrabCut {
    #[must_use]
    pub fn new(config: GrabCutConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GrabCutConfig {
        &self.config
    }

    /// Foreground mask at the grid's own resolution
    ///
    /// # Errors
    /// Propagates resize failures. Degenerate inputs do not fail: they get
    /// the seed rectangle as their mask.
    pub fn segment(&self, grid: &PixelGrid) -> Result<SegmentationMask> {
        let (w, h) = grid.dimensions();
        let rgb = PixelGrid::from_rgb_image(&grid.to_rgb_image());

        let longest = w.max(h).max(1);
        let scale = (self.config.max_dimension.max(1) as f32 / longest as f32).min(1.0);
        let sw = ((w as f32 * scale).round() as u32).max(1);
        let sh = ((h as f32 * scale).round() as u32).max(1);
        let small = resize(&rgb, sw, sh, FilterType::Triangle)?;

        let labels = self.segment_labels(&small);
        let small_mask: Vec<u8> = labels.iter().map(|l| if l.is_foreground() { 255 } else { 0 }).collect();

        let (sw, sh) = (sw as usize, sh as usize);
        let mut data = Vec::with_capacity((w * h) as usize);
        for y in 0..h as usize {
            let sy = (y * sh / h as usize).min(sh - 1);
            for x in 0..w as usize {
                let sx = (x * sw / w as usize).min(sw - 1);
                data.push(small_mask[sy * sw + sx]);
            }
        }
        let mask = SegmentationMask::new(data, (w, h));
        log::debug!(
            "GrabCut {}x{} (work {}x{}): {:.1}% foreground",
            w,
            h,
            sw,
            sh,
            mask.foreground_ratio() * 100.0
        );
        Ok(mask)
    }

    fn segment_labels(&self, grid: &PixelGrid) -> Vec<Label> {
        let (h, w) = (grid.height(), grid.width());
        let rect = SeedRect::inset(w, h, self.config.padding_percent);
        let mut labels: Vec<Label> = (0..h * w)
            .map(|i| {
                if rect.contains(i % w, i / w) {
                    Label::ProbableForeground
                } else {
                    Label::Background
                }
            })
            .collect();

        if w < 3 || h < 3 || rect.is_empty() {
            log::debug!("GrabCut input too small ({}x{}), using seed rectangle", w, h);
            return labels;
        }

        let pixels: Vec<[f64; 3]> = grid
            .to_raw()
            .chunks_exact(3)
            .map(|p| [f64::from(p[0]), f64::from(p[1]), f64::from(p[2])])
            .collect();

        let (mut fg_model, mut bg_model) = match initial_models(&pixels, &labels) {
            Some(models) => models,
            None => {
                log::debug!("GrabCut seed has no foreground or background samples");
                return labels;
            },
        };

        let beta = compute_beta(&pixels, w, h);
        let links = neighbour_links(&pixels, w, h, beta);
        let lambda = 9.0 * GAMMA;

        for _ in 0..self.config.iterations.max(1) {
            let Some((fg, bg)) = refit_models(&pixels, &labels, &fg_model, &bg_model) else {
                break;
            };
            fg_model = fg;
            bg_model = bg;

            let mut graph = FlowGraph::new(w * h);
            for (i, (label, x)) in labels.iter().zip(&pixels).enumerate() {
                let (from_source, to_sink) = if label.is_probable() {
                    (bg_model.neg_log_likelihood(x), fg_model.neg_log_likelihood(x))
                } else {
                    (0.0, lambda)
                };
                graph.add_terminal_weights(i, from_source, to_sink);
            }
            for &(a, b, weight) in &links {
                graph.add_edge(a, b, weight);
            }

            graph.max_flow();
            let source_side = graph.source_side();
            for (label, &in_source) in labels.iter_mut().zip(&source_side) {
                if label.is_probable() {
                    *label = if in_source {
                        Label::ProbableForeground
                    } else {
                        Label::ProbableBackground
                    };
                }
            }
        }
        labels
    }
}

fn split_samples(pixels: &[[f64; 3]], labels: &[Label]) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
    let mut fg = Vec::new();
    let mut bg = Vec::new();
    for (x, label) in pixels.iter().zip(labels) {
        if label.is_foreground() {
            fg.push(*x);
        } else {
            bg.push(*x);
        }
    }
    (fg, bg)
}

fn initial_models(pixels: &[[f64; 3]], labels: &[Label]) -> Option<(Gmm, Gmm)> {
    let (fg, bg) = split_samples(pixels, labels);
    if fg.is_empty() || bg.is_empty() {
        return None;
    }
    Some((Gmm::initial(&fg), Gmm::initial(&bg)))
}

/// Assign every sample to its most likely component, then refit both models
fn refit_models(pixels: &[[f64; 3]], labels: &[Label], fg_model: &Gmm, bg_model: &Gmm) -> Option<(Gmm, Gmm)> {
    let (fg, bg) = split_samples(pixels, labels);
    if fg.is_empty() || bg.is_empty() {
        return None;
    }
    let fg_assign: Vec<usize> = fg.iter().map(|x| fg_model.most_likely_component(x)).collect();
    let bg_assign: Vec<usize> = bg.iter().map(|x| bg_model.most_likely_component(x)).collect();
    Some((Gmm::fit(&fg, &fg_assign), Gmm::fit(&bg, &bg_assign)))
}

/// Back-looking half of the 8-neighbourhood: left, up-left, up, up-right
const NEIGHBOUR_OFFSETS: [(isize, isize, bool); 4] = [(-1, 0, false), (-1, -1, true), (0, -1, false), (1, -1, true)];

fn color_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (0..3).map(|c| (a[c] - b[c]) * (a[c] - b[c])).sum()
}

/// `1 / (2 * mean squared neighbour colour difference)`, 0 for flat images
fn compute_beta(pixels: &[[f64; 3]], w: usize, h: usize) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..h {
        for x in 0..w {
            for &(dx, dy, _) in &NEIGHBOUR_OFFSETS {
                let (nx, ny) = (x as isize + dx, y as isize + dy);
                if nx < 0 || ny < 0 || nx >= w as isize {
                    continue;
                }
                total += color_distance(&pixels[y * w + x], &pixels[ny as usize * w + nx as usize]);
                count += 1;
            }
        }
    }
    if total <= f64::EPSILON || count == 0 {
        return 0.0;
    }
    1.0 / (2.0 * total / count as f64)
}

fn neighbour_links(pixels: &[[f64; 3]], w: usize, h: usize, beta: f64) -> Vec<(usize, usize, f64)> {
    let mut links = Vec::with_capacity(w * h * 4);
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            for &(dx, dy, diagonal) in &NEIGHBOUR_OFFSETS {
                let (nx, ny) = (x as isize + dx, y as isize + dy);
                if nx < 0 || ny < 0 || nx >= w as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                let base = if diagonal { GAMMA / SQRT_2 } else { GAMMA };
                links.push((i, j, base * (-beta * color_distance(&pixels[i], &pixels[j])).exp()));
            }
        }
    }
    links
}

/// Attach a mask as the alpha channel of the grid's RGB content
#[must_use]
pub fn apply_alpha(grid: &PixelGrid, mask: &SegmentationMask) -> PixelGrid {
    let rgb = grid.to_rgb_image();
    let data = Array3::from_shape_fn((grid.height(), grid.width(), 4), |(y, x, c)| {
        if c == 3 {
            mask.at(x as u32, y as u32)
        } else {
            rgb.get_pixel(x as u32, y as u32)[c]
        }
    });
    PixelGrid::from_array_unchecked(data)
}

/// Sharp foreground over a Gaussian-blurred copy of the whole image
#[must_use]
pub fn composite_blur(grid: &PixelGrid, mask: &SegmentationMask, blur_strength: u32) -> PixelGrid {
    let rgb = PixelGrid::from_rgb_image(&grid.to_rgb_image());
    let blurred = gaussian_blur(&rgb, sigma_for_kernel(blur_strength));
    let (sharp, soft) = (rgb.as_array(), blurred.as_array());
    let data = Array3::from_shape_fn(sharp.dim(), |(y, x, c)| {
        if mask.at(x as u32, y as u32) > 127 {
            sharp[[y, x, c]]
        } else {
            soft[[y, x, c]]
        }
    });
    PixelGrid::from_array_unchecked(data)
}

/// Cut out the subject: RGBA with the segmentation mask as alpha
///
/// # Errors
/// Propagates segmentation failures.
pub fn background_removal(grid: &PixelGrid, config: &GrabCutConfig) -> Result<PixelGrid> {
    let mask = GrabCut::new(*config).segment(grid)?;
    Ok(apply_alpha(grid, &mask))
}

/// Keep the subject sharp and blur everything behind it
///
/// # Errors
/// Propagates segmentation failures.
pub fn background_blur(grid: &PixelGrid, config: &GrabCutConfig, blur_strength: u32) -> Result<PixelGrid> {
    let mask = GrabCut::new(*config).segment(grid)?;
    Ok(composite_blur(grid, &mask, blur_strength))
}
