//! Mock inference backend for tests
//!
//! Lets the learned operators and the model registry be exercised without
//! model files or a native runtime.

use crate::{
    error::{FxError, Result},
    inference::InferenceBackend,
};
use ndarray::Array4;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
enum MockMode {
    /// Echo the input tensor
    Identity,
    /// Return `1 - input` (for unit-range models this inverts the picture)
    Complement,
    /// Always fail
    Failing,
}

/// Mock backend with configurable behaviour and a record of input shapes
#[derive(Debug, Clone)]
pub struct MockBackend {
    mode: MockMode,
    calls: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl MockBackend {
    fn with_mode(mode: MockMode) -> Self {
        Self {
            mode,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn identity() -> Self {
        Self::with_mode(MockMode::Identity)
    }

    #[must_use]
    pub fn complement() -> Self {
        Self::with_mode(MockMode::Complement)
    }

    #[must_use]
    pub fn failing() -> Self {
        Self::with_mode(MockMode::Failing)
    }

    /// Shapes of every tensor passed to `infer`, in call order
    pub fn call_history(&self) -> Vec<Vec<usize>> {
        self.calls.lock().unwrap().clone()
    }
}

impl InferenceBackend for MockBackend {
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(input.shape().to_vec());
        }
        match self.mode {
            MockMode::Identity => Ok(input.clone()),
            MockMode::Complement => Ok(input.mapv(|v| 1.0 - v)),
            MockMode::Failing => Err(FxError::processing("Mock backend inference failed")),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_modes() {
        let input = Array4::<f32>::from_elem((1, 3, 2, 2), 0.25);

        let identity = MockBackend::identity();
        assert_eq!(identity.infer(&input).unwrap(), input);
        assert_eq!(identity.call_history(), vec![vec![1, 3, 2, 2]]);

        let complement = MockBackend::complement();
        let out = complement.infer(&input).unwrap();
        assert!(out.iter().all(|&v| (v - 0.75).abs() < 1e-6));

        let failing = MockBackend::failing();
        assert!(matches!(failing.infer(&input), Err(FxError::Processing(_))));
    }
}
