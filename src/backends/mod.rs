//! Inference engines for the learned operators
//!
//! - ONNX Runtime backend (`onnx` feature)
//! - Tract backend (`tract` feature, pure Rust)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

use crate::error::Result;
use crate::inference::{BackendFactory, BackendType, InferenceBackend};
use std::sync::Arc;

/// Factory over the backends compiled into this build
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    #[allow(unused_variables)]
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_data: &[u8],
        threads: usize,
    ) -> Result<Arc<dyn InferenceBackend>> {
        match backend_type {
            BackendType::Onnx => {
                #[cfg(feature = "onnx")]
                {
                    Ok(Arc::new(OnnxBackend::from_bytes(model_data, threads)?))
                }
                #[cfg(not(feature = "onnx"))]
                {
                    Err(crate::error::FxError::invalid_config(
                        "ONNX backend not compiled in (enable the 'onnx' feature)",
                    ))
                }
            },
            BackendType::Tract => {
                #[cfg(feature = "tract")]
                {
                    Ok(Arc::new(TractBackend::from_bytes(model_data)?))
                }
                #[cfg(not(feature = "tract"))]
                {
                    Err(crate::error::FxError::invalid_config(
                        "Tract backend not compiled in (enable the 'tract' feature)",
                    ))
                }
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        BackendType::ALL
            .into_iter()
            .filter(|backend| match backend {
                BackendType::Onnx => cfg!(feature = "onnx"),
                BackendType::Tract => cfg!(feature = "tract"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_backends_match_features() {
        let available = DefaultBackendFactory.available_backends();
        assert_eq!(available.contains(&BackendType::Onnx), cfg!(feature = "onnx"));
        assert_eq!(available.contains(&BackendType::Tract), cfg!(feature = "tract"));
    }

    #[test]
    fn test_garbage_model_fails_to_build() {
        for backend in DefaultBackendFactory.available_backends() {
            let result = DefaultBackendFactory.create_backend(backend, b"garbage", 1);
            assert!(result.is_err(), "{backend} accepted garbage bytes");
        }
    }
}
