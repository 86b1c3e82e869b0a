//! Core pixel types shared by the codec, the operators and the inference layer

use crate::error::{FxError, Result};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

/// Output container for an encoded result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy JPEG, the default for every operator without alpha
    #[default]
    Jpeg,
    /// Lossless PNG, mandatory whenever the grid carries alpha
    Png,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(FxError::invalid_parameter(format!(
                "Unsupported output format '{other}' (expected jpeg or png)"
            ))),
        }
    }
}

/// A decoded bitmap: `height x width x channels` bytes in row-major order
///
/// Channel order is RGB, RGBA when alpha is present, and a single luma
/// channel for grayscale grids. Operators never mutate their input grid;
/// they always return a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    data: Array3<u8>,
}

impl PixelGrid {
    /// Wrap an `(H, W, C)` array, rejecting channel counts other than 1, 3 or 4
    pub fn new(data: Array3<u8>) -> Result<Self> {
        let channels = data.dim().2;
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FxError::processing(format!(
                "Unsupported channel count {channels}; expected 1, 3 or 4"
            )));
        }
        Ok(Self { data })
    }

    /// Wrap an array whose channel count the caller already guarantees
    pub(crate) fn from_array_unchecked(data: Array3<u8>) -> Self {
        debug_assert!(matches!(data.dim().2, 1 | 3 | 4));
        Self { data }
    }

    /// Build a grid from raw interleaved bytes
    pub fn from_raw(height: usize, width: usize, channels: usize, raw: Vec<u8>) -> Result<Self> {
        let data = Array3::from_shape_vec((height, width, channels), raw).map_err(|e| {
            FxError::processing(format!(
                "Raw buffer does not match {width}x{height}x{channels}: {e}"
            ))
        })?;
        Self::new(data)
    }

    /// A grid where every pixel equals `pixel`
    ///
    /// # Panics
    /// Panics if `pixel` does not have 1, 3 or 4 components.
    #[must_use]
    pub fn filled(height: usize, width: usize, pixel: &[u8]) -> Self {
        assert!(
            matches!(pixel.len(), 1 | 3 | 4),
            "pixel must have 1, 3 or 4 components"
        );
        let channels = pixel.len();
        let data = Array3::from_shape_fn((height, width, channels), |(_, _, c)| pixel[c]);
        Self { data }
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    /// Width in pixels
    #[must_use]
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    /// Number of interleaved channels (1, 3 or 4)
    #[must_use]
    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// `(width, height)` in the order the `image` crate expects
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width() as u32, self.height() as u32)
    }

    /// True if the grid has zero height or width
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    /// True if the last channel is alpha
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.channels() == 4
    }

    #[must_use]
    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    #[must_use]
    pub fn as_array(&self) -> &Array3<u8> {
        &self.data
    }

    #[must_use]
    pub fn into_array(self) -> Array3<u8> {
        self.data
    }

    /// Sample at row `y`, column `x`, channel `c`
    #[must_use]
    pub fn get(&self, y: usize, x: usize, c: usize) -> u8 {
        self.data[[y, x, c]]
    }

    /// Interleaved bytes in row-major order
    #[must_use]
    pub fn to_raw(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    /// Convert any decoded image into a grid, keeping gray, RGB or RGBA layout
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray_image(gray),
            DynamicImage::ImageLuma16(_) => Self::from_gray_image(&image.to_luma8()),
            DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
                Self::from_rgba_image(&image.to_rgba8())
            },
            other if other.color().has_alpha() => Self::from_rgba_image(&other.to_rgba8()),
            other => Self::from_rgb_image(&other.to_rgb8()),
        }
    }

    /// Convert an uploaded image into an operator input grid
    ///
    /// Gray inputs stay single channel and everything else becomes RGB. Any
    /// alpha channel is discarded; only transparency-producing operators
    /// emit 4-channel grids.
    #[must_use]
    pub fn from_decoded(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray_image(gray),
            DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
                Self::from_gray_image(&image.to_luma8())
            },
            other => Self::from_rgb_image(&other.to_rgb8()),
        }
    }

    #[must_use]
    pub fn from_gray_image(image: &GrayImage) -> Self {
        let (w, h) = image.dimensions();
        let data = Array3::from_shape_fn((h as usize, w as usize, 1), |(y, x, _)| {
            image.get_pixel(x as u32, y as u32)[0]
        });
        Self { data }
    }

    #[must_use]
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let (w, h) = image.dimensions();
        let data = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
            image.get_pixel(x as u32, y as u32)[c]
        });
        Self { data }
    }

    #[must_use]
    pub fn from_rgba_image(image: &RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        let data = Array3::from_shape_fn((h as usize, w as usize, 4), |(y, x, c)| {
            image.get_pixel(x as u32, y as u32)[c]
        });
        Self { data }
    }

    /// Luma plane; 1-channel grids are copied, colour grids use BT.601 weights
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        let (w, h) = self.dimensions();
        GrayImage::from_fn(w, h, |x, y| {
            let (x, y) = (x as usize, y as usize);
            if self.channels() == 1 {
                image::Luma([self.data[[y, x, 0]]])
            } else {
                image::Luma([crate::utils::color::luma(
                    self.data[[y, x, 0]],
                    self.data[[y, x, 1]],
                    self.data[[y, x, 2]],
                )])
            }
        })
    }

    /// RGB view of the grid; gray is replicated and alpha dropped
    #[must_use]
    pub fn to_rgb_image(&self) -> RgbImage {
        let (w, h) = self.dimensions();
        RgbImage::from_fn(w, h, |x, y| {
            let (x, y) = (x as usize, y as usize);
            if self.channels() == 1 {
                let v = self.data[[y, x, 0]];
                image::Rgb([v, v, v])
            } else {
                image::Rgb([
                    self.data[[y, x, 0]],
                    self.data[[y, x, 1]],
                    self.data[[y, x, 2]],
                ])
            }
        })
    }

    /// Convert into the matching `DynamicImage` variant
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = self.dimensions();
        let raw = self.to_raw();
        let image = match self.channels() {
            1 => GrayImage::from_raw(w, h, raw).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(w, h, raw).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, raw).map(DynamicImage::ImageRgba8),
            _ => None,
        };
        image.ok_or_else(|| {
            FxError::encode(format!(
                "Cannot build a {}-channel {}x{} image buffer",
                self.channels(),
                w,
                h
            ))
        })
    }
}

impl From<GrayImage> for PixelGrid {
    fn from(image: GrayImage) -> Self {
        Self::from_gray_image(&image)
    }
}

impl From<RgbImage> for PixelGrid {
    fn from(image: RgbImage) -> Self {
        Self::from_rgb_image(&image)
    }
}

impl From<RgbaImage> for PixelGrid {
    fn from(image: RgbaImage) -> Self {
        Self::from_rgba_image(&image)
    }
}

/// Binary foreground mask produced by segmentation (255 = foreground)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// Row-major mask values
    pub data: Vec<u8>,
    /// `(width, height)`
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Fraction of pixels marked as foreground
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let fg = self.data.iter().filter(|&&v| v > 127).count();
        fg as f32 / self.data.len() as f32
    }

    /// Mask value at `(x, y)`
    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.dimensions.0 + x) as usize]
    }
}

/// Encoded operator output
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub dimensions: (u32, u32),
}
