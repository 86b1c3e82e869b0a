//! Tensor validation utilities
//!
//! Shape checks for the tensors exchanged with inference backends.

use crate::error::{FxError, Result};
use crate::utils::preprocessing::TensorLayout;
use ndarray::Array4;

/// Validator for tensor shapes and image dimensions
pub struct TensorValidator;

impl TensorValidator {
    /// Validate that a model output is a single 3-channel image in `layout`
    ///
    /// Returns `(height, width)` of the spatial dimensions.
    pub fn validate_image_tensor(tensor: &Array4<f32>, layout: TensorLayout) -> Result<(usize, usize)> {
        let (batch, d1, d2, d3) = tensor.dim();
        let (channels, height, width) = match layout {
            TensorLayout::Nchw => (d1, d2, d3),
            TensorLayout::Nhwc => (d3, d1, d2),
        };

        if batch != 1 {
            return Err(FxError::processing(format!(
                "Model output must have batch size 1, got {}",
                batch
            )));
        }
        if channels != 3 {
            return Err(FxError::processing(format!(
                "Model output must have 3 channels in {:?} layout, got shape [{}, {}, {}, {}]",
                layout, batch, d1, d2, d3
            )));
        }
        if height == 0 || width == 0 {
            return Err(FxError::processing("Model output has empty spatial dimensions"));
        }
        Ok((height, width))
    }

    /// Validate image dimensions are within reasonable bounds for inference
    pub fn validate_image_dimensions(width: u32, height: u32) -> Result<()> {
        const MAX_DIMENSION: u32 = 16384;

        if width == 0 || height == 0 {
            return Err(FxError::processing(format!(
                "Image dimensions too small for inference: {}x{}",
                width, height
            )));
        }

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(FxError::invalid_parameter(format!(
                "Image dimensions too large for inference: {}x{}. Maximum: {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok(())
    }
}
