//! Inference backend abstraction for the learned operators

use crate::error::{FxError, Result};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A loaded network that maps one input tensor to one output tensor
///
/// Implementations are constructed once at startup and shared read-only by
/// every request, so `infer` takes `&self`. Backends whose runtime needs
/// exclusive access per run must serialize internally.
pub trait InferenceBackend: Send + Sync {
    /// Run a single forward pass and return the first output tensor
    ///
    /// # Errors
    /// - Input shape rejected by the runtime
    /// - Runtime execution failure
    /// - Output is not a 4D `f32` tensor
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Inference runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime (native library)
    #[default]
    Onnx,
    /// Tract (pure Rust)
    Tract,
}

impl BackendType {
    /// All known backend types, in preference order
    pub const ALL: [Self; 2] = [Self::Onnx, Self::Tract];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Tract => "tract",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendType {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" | "ort" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(FxError::invalid_config(format!(
                "Unknown backend '{other}' (expected one of: onnx, tract)"
            ))),
        }
    }
}

/// Creates backends from raw model bytes
///
/// Keeps the model registry independent of which runtimes were compiled in.
pub trait BackendFactory: Send + Sync {
    /// Build a ready backend for the given model
    ///
    /// # Errors
    /// - Backend type not compiled in
    /// - Model bytes rejected by the runtime
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_data: &[u8],
        threads: usize,
    ) -> Result<Arc<dyn InferenceBackend>>;

    /// Backend types available in this build
    fn available_backends(&self) -> Vec<BackendType>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackend;

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("onnx".parse::<BackendType>().unwrap(), BackendType::Onnx);
        assert_eq!("Tract".parse::<BackendType>().unwrap(), BackendType::Tract);
        assert!(matches!(
            "cuda".parse::<BackendType>(),
            Err(FxError::InvalidConfig(_))
        ));
        assert_eq!(BackendType::default(), BackendType::Onnx);
        assert_eq!(BackendType::Tract.to_string(), "tract");
    }

    #[test]
    fn test_backend_type_serde() {
        let json = serde_json::to_string(&BackendType::Tract).unwrap();
        assert_eq!(json, "\"tract\"");
        let back: BackendType = serde_json::from_str("\"onnx\"").unwrap();
        assert_eq!(back, BackendType::Onnx);
    }

    #[test]
    fn test_trait_object_is_shareable() {
        let backend: Arc<dyn InferenceBackend> = Arc::new(MockBackend::identity());
        let clone = Arc::clone(&backend);
        let handle = std::thread::spawn(move || {
            let input = Array4::<f32>::zeros((1, 3, 4, 4));
            clone.infer(&input).map(|out| out.shape().to_vec())
        });
        let shape = handle.join().unwrap().unwrap();
        assert_eq!(shape, vec![1, 3, 4, 4]);
        assert_eq!(backend.name(), "mock");
    }
}
