//! Tensor preparation for learned operators
//!
//! Converts a pixel grid into the normalized 4D tensor a model expects and
//! turns the model's output tensor back into a pixel grid of the original
//! size.

use crate::{
    error::{FxError, Result},
    types::PixelGrid,
    utils::{
        color::saturate,
        filters::{border_index, resampling_filter, resize, Border},
        validation::TensorValidator,
    },
};
use image::imageops::FilterType;
use ndarray::{Array3, Array4};
use serde::{Deserialize, Serialize};

/// Memory layout of the 4D input/output tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorLayout {
    /// `[batch, channels, height, width]`
    Nchw,
    /// `[batch, height, width, channels]`
    Nhwc,
}

/// Value range the model works in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// `v / 255`
    UnitRange,
    /// `v / 127.5 - 1`
    SignedUnitRange,
}

/// How the spatial size is adapted to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSizing {
    /// Reflect-101 pad each side so height and width become multiples of the stride
    PadToMultiple(u32),
    /// Resize to a fixed input size and back afterwards
    Resize { width: u32, height: u32 },
}

/// Everything needed to move between grids and model tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub layout: TensorLayout,
    pub normalization: Normalization,
    pub sizing: InputSizing,
}

/// Padding applied on each side, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Padding {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

/// A tensor ready for inference plus what is needed to undo the preparation
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub tensor: Array4<f32>,
    /// `(width, height)` of the source grid
    pub original: (u32, u32),
    pub padding: Padding,
}

/// Shared preprocessing for model-backed operators
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Prepare `grid` for a forward pass
    ///
    /// Alpha is dropped and grayscale is replicated; the model always sees RGB.
    ///
    /// # Errors
    /// - Empty or oversized input
    /// - Resize failures
    pub fn preprocess(grid: &PixelGrid, config: &PreprocessingConfig) -> Result<PreparedInput> {
        let (width, height) = grid.dimensions();
        TensorValidator::validate_image_dimensions(width, height)?;

        let rgb = PixelGrid::from_rgb_image(&grid.to_rgb_image());
        let (prepared, padding) = match config.sizing {
            InputSizing::PadToMultiple(multiple) => Self::pad_reflect101(&rgb, multiple as usize),
            InputSizing::Resize {
                width: tw,
                height: th,
            } => {
                let filter = resampling_filter((width, height), (tw, th));
                (resize(&rgb, tw, th, filter)?, Padding::default())
            },
        };

        let tensor = Self::to_tensor(&prepared, config.layout, config.normalization);
        log::debug!(
            "Prepared {}x{} input as tensor {:?} ({:?}, {:?})",
            width,
            height,
            tensor.shape(),
            config.layout,
            config.normalization
        );

        Ok(PreparedInput {
            tensor,
            original: (width, height),
            padding,
        })
    }

    /// Convert a model output back into an RGB grid of the original size
    ///
    /// # Errors
    /// - Output tensor is not a single 3-channel image
    /// - Padded output smaller than the original image
    pub fn postprocess(
        output: &Array4<f32>,
        prepared: &PreparedInput,
        config: &PreprocessingConfig,
    ) -> Result<PixelGrid> {
        let (out_h, out_w) = TensorValidator::validate_image_tensor(output, config.layout)?;
        let (orig_w, orig_h) = (prepared.original.0 as usize, prepared.original.1 as usize);

        let denormalize = |v: f32| -> u8 {
            match config.normalization {
                Normalization::UnitRange => saturate(v * 255.0),
                Normalization::SignedUnitRange => saturate((v + 1.0) * 127.5),
            }
        };

        let sample = |y: usize, x: usize, c: usize| -> f32 {
            match config.layout {
                TensorLayout::Nchw => output[[0, c, y, x]],
                TensorLayout::Nhwc => output[[0, y, x, c]],
            }
        };

        match config.sizing {
            InputSizing::PadToMultiple(_) => {
                let pad = prepared.padding;
                if out_h < pad.top + orig_h || out_w < pad.left + orig_w {
                    return Err(FxError::processing_stage_error(
                        "postprocess",
                        &format!(
                            "model output {}x{} is smaller than the padded input",
                            out_w, out_h
                        ),
                        Some(&format!("{}x{}", orig_w, orig_h)),
                    ));
                }
                let data = Array3::from_shape_fn((orig_h, orig_w, 3), |(y, x, c)| {
                    denormalize(sample(y + pad.top, x + pad.left, c))
                });
                PixelGrid::new(data)
            },
            InputSizing::Resize { .. } => {
                let data = Array3::from_shape_fn((out_h, out_w, 3), |(y, x, c)| {
                    denormalize(sample(y, x, c))
                });
                let model_sized = PixelGrid::new(data)?;
                resize(
                    &model_sized,
                    prepared.original.0,
                    prepared.original.1,
                    FilterType::CatmullRom,
                )
            },
        }
    }

    /// Reflect-101 pad so both dimensions become multiples of `multiple`
    ///
    /// Padding is split between the two sides, the extra pixel going to the
    /// bottom/right.
    #[must_use]
    pub fn pad_reflect101(grid: &PixelGrid, multiple: usize) -> (PixelGrid, Padding) {
        let (h, w, c) = (grid.height(), grid.width(), grid.channels());
        if multiple <= 1 {
            return (grid.clone(), Padding::default());
        }
        let pad_h = (multiple - h % multiple) % multiple;
        let pad_w = (multiple - w % multiple) % multiple;
        let padding = Padding {
            top: pad_h / 2,
            bottom: pad_h - pad_h / 2,
            left: pad_w / 2,
            right: pad_w - pad_w / 2,
        };
        if pad_h == 0 && pad_w == 0 {
            return (grid.clone(), padding);
        }

        let src = grid.as_array();
        let data = Array3::from_shape_fn((h + pad_h, w + pad_w, c), |(y, x, ch)| {
            let sy = border_index(y as isize - padding.top as isize, h, Border::Reflect101);
            let sx = border_index(x as isize - padding.left as isize, w, Border::Reflect101);
            src[[sy, sx, ch]]
        });
        (PixelGrid::from_array_unchecked(data), padding)
    }

    fn to_tensor(grid: &PixelGrid, layout: TensorLayout, normalization: Normalization) -> Array4<f32> {
        let (h, w) = (grid.height(), grid.width());
        let src = grid.as_array();
        let normalize = |v: u8| -> f32 {
            match normalization {
                Normalization::UnitRange => f32::from(v) / 255.0,
                Normalization::SignedUnitRange => f32::from(v) / 127.5 - 1.0,
            }
        };
        match layout {
            TensorLayout::Nchw => {
                Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| normalize(src[[y, x, c]]))
            },
            TensorLayout::Nhwc => {
                Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| normalize(src[[y, x, c]]))
            },
        }
    }
}
