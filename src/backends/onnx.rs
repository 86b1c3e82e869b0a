//! ONNX Runtime backend
//!
//! Sessions are built from in-memory model bytes once at startup. A run needs
//! exclusive access to the session, so concurrent requests are serialized on
//! a mutex.

use crate::error::{FxError, Result};
use crate::inference::InferenceBackend;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::sync::Mutex;
use std::time::Instant;

/// ONNX Runtime session for one model
#[derive(Debug)]
pub struct OnnxBackend {
    session: Mutex<Session>,
}

impl OnnxBackend {
    /// Build a session from serialized ONNX bytes
    ///
    /// `threads == 0` picks the number of available cores.
    ///
    /// # Errors
    /// - Session builder or threading configuration rejected by ONNX Runtime
    /// - Model bytes are not a valid ONNX graph
    pub fn from_bytes(model_data: &[u8], threads: usize) -> Result<Self> {
        let load_start = Instant::now();

        let intra_threads = if threads > 0 {
            threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let session = Session::builder()
            .map_err(|e| FxError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| FxError::model(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| FxError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(model_data)
            .map_err(|e| {
                FxError::model(format!("Failed to create session from model data: {e}"))
            })?;

        #[allow(clippy::cast_precision_loss)]
        let size_mb = model_data.len() as f64 / (1024.0 * 1024.0);
        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Threading: {intra_threads} intra-op threads");
        log::debug!("  - Optimization level: Level3");
        log::debug!("  - Model size: {size_mb:.2} MB");
        log::info!(
            "📊 ONNX model loaded in {:.0}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let inference_start = Instant::now();
        log::debug!("🚀 Starting ONNX inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| FxError::processing(format!("Failed to convert input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| FxError::processing("ONNX session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| FxError::processing(format!("ONNX inference failed: {e}")))?;

        // Positional access: the first output is the image
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| FxError::processing("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| FxError::processing("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| FxError::processing(format!("Failed to extract output tensor: {e}")))?;

        let shape = output_tensor.shape().to_vec();
        if shape.len() != 4 {
            return Err(FxError::processing(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        }
        let output = Array4::from_shape_vec(
            (shape[0], shape[1], shape[2], shape[3]),
            output_tensor.iter().copied().collect(),
        )
        .map_err(|e| FxError::processing(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "⚡ ONNX inference complete: {:.2}ms, output {:?}",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            output.dim()
        );
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_bytes_are_rejected() {
        let result = OnnxBackend::from_bytes(b"definitely not an onnx graph", 1);
        assert!(matches!(result, Err(FxError::Model(_))));
    }
}
