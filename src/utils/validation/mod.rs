//! Validation utilities for parameters, configuration and tensors

pub mod numeric;
pub mod tensor;

pub use numeric::NumericValidator;
pub use tensor::TensorValidator;
