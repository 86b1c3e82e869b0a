//! Utility modules shared by the operators and the inference layer

pub mod clahe;
pub mod color;
pub mod filters;
pub mod preprocessing;
pub mod validation;

// Re-export commonly used items for convenience
pub use preprocessing::{
    ImagePreprocessor, InputSizing, Normalization, Padding, PreparedInput, PreprocessingConfig,
    TensorLayout,
};
pub use validation::{NumericValidator, TensorValidator};
