//! Tract backend: pure Rust ONNX inference
//!
//! The optimized plan is immutable once built, so it is shared across
//! requests without locking. Input shapes are left symbolic and resolved per
//! run, which lets padded inputs of any size through.

use crate::error::{FxError, Result};
use crate::inference::InferenceBackend;
use ndarray::Array4;
use std::time::Instant;
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract runnable plan for one model
#[derive(Debug)]
pub struct TractBackend {
    model: TractModel,
}

impl TractBackend {
    /// Parse, optimize and plan a serialized ONNX graph
    ///
    /// # Errors
    /// - Bytes are not a valid ONNX graph
    /// - Graph uses operators Tract cannot optimize
    pub fn from_bytes(model_data: &[u8]) -> Result<Self> {
        let load_start = Instant::now();
        log::info!("🚀 Initializing Tract backend (pure Rust, CPU)");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| FxError::model(format!("Failed to load ONNX model: {e}")))?
            .into_optimized()
            .map_err(|e| FxError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| FxError::model(format!("Failed to create runnable model: {e}")))?;

        log::info!(
            "✅ Tract backend initialized in {}ms",
            load_start.elapsed().as_millis()
        );
        Ok(Self { model })
    }
}

impl InferenceBackend for TractBackend {
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        log::debug!("🔮 Running Tract inference, input {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| FxError::processing(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| FxError::processing("No output tensor found"))?
            .into_arc_tensor();
        let output_view = output_tensor
            .to_array_view::<f32>()
            .map_err(|e| FxError::processing(format!("Failed to convert output tensor: {e}")))?;

        let shape = output_view.shape().to_vec();
        if shape.len() != 4 {
            return Err(FxError::processing(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        }
        let output = Array4::from_shape_vec(
            (shape[0], shape[1], shape[2], shape[3]),
            output_view.iter().copied().collect(),
        )
        .map_err(|e| FxError::processing(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "✅ Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output.shape()
        );
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_bytes_are_rejected() {
        let result = TractBackend::from_bytes(&[0x08, 0x07, 0xff, 0x00]);
        assert!(matches!(result, Err(FxError::Model(_))));
    }
}
