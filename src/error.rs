//! Error types for image transformation operations

use thiserror::Error;

/// Result type alias for lumafx operations
pub type Result<T> = std::result::Result<T, FxError>;

/// Error types for decoding, transforming and encoding images
#[derive(Error, Debug)]
pub enum FxError {
    /// Input bytes are empty, truncated or not a recognized image container
    #[error("Decode error: {0}")]
    Decode(String),

    /// A pixel grid could not be serialized into the requested container
    #[error("Encode error: {0}")]
    Encode(String),

    /// Operator name or parameter value is outside its declared domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A learned operator was invoked but its model is not loaded
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Unexpected failure inside an operator or the inference runtime
    #[error("Processing error: {0}")]
    Processing(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid service configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by the HTTP and CLI boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable
    Client,
    /// A required model is not loaded
    Unavailable,
    /// Anything that went wrong on our side
    Server,
}

impl ErrorKind {
    /// Stable lowercase label for structured error bodies
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client_error",
            Self::Unavailable => "unavailable",
            Self::Server => "server_error",
        }
    }
}

impl FxError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new model unavailable error
    pub fn model_unavailable<S: Into<String>>(model: S) -> Self {
        Self::ModelUnavailable(model.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create parameter error with the valid range
    pub fn parameter_range_error<T: std::fmt::Display>(
        operator: &str,
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidParameter(format!(
            "{}: '{}' = {} is outside the valid range {}",
            operator, parameter, value, valid_range
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {} model '{}': {}.{}",
            operation, path_display, error, suggestion_text
        ))
    }

    /// Classify this error for the outer boundary
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) | Self::InvalidParameter(_) => ErrorKind::Client,
            Self::ModelUnavailable(_) => ErrorKind::Unavailable,
            Self::Encode(_)
            | Self::Processing(_)
            | Self::Model(_)
            | Self::InvalidConfig(_)
            | Self::Io(_) => ErrorKind::Server,
        }
    }

    /// Re-classify anything that escaped an operator as a processing failure
    ///
    /// Decode, parameter and model-availability errors keep their identity;
    /// everything else becomes [`FxError::Processing`] tagged with the stage.
    #[must_use]
    pub fn at_stage(self, stage: &str) -> Self {
        match self {
            Self::Decode(_)
            | Self::Encode(_)
            | Self::InvalidParameter(_)
            | Self::ModelUnavailable(_)
            | Self::Processing(_) => self,
            other => Self::processing_stage_error(stage, &other.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = FxError::invalid_parameter("unknown operator 'foo'");
        assert!(matches!(err, FxError::InvalidParameter(_)));

        let err = FxError::decode("empty input");
        assert!(matches!(err, FxError::Decode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = FxError::model_unavailable("anime");
        assert_eq!(err.to_string(), "Model unavailable: anime");
    }

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(FxError::decode("x").kind(), ErrorKind::Client);
        assert_eq!(FxError::invalid_parameter("x").kind(), ErrorKind::Client);
        assert_eq!(FxError::model_unavailable("x").kind(), ErrorKind::Unavailable);
        assert_eq!(FxError::encode("x").kind(), ErrorKind::Server);
        assert_eq!(FxError::processing("x").kind(), ErrorKind::Server);
        assert_eq!(ErrorKind::Unavailable.as_str(), "unavailable");
    }

    #[test]
    fn test_at_stage_reclassifies_internal_errors() {
        let err = FxError::model("session poisoned").at_stage("inference");
        assert!(matches!(err, FxError::Processing(_)));
        assert!(err.to_string().contains("inference"));

        let err = FxError::invalid_parameter("bad").at_stage("dispatch");
        assert!(matches!(err, FxError::InvalidParameter(_)));
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = FxError::file_io_error("read config file", Path::new("/etc/lumafx.json"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("read config file"));
        assert!(error_string.contains("/etc/lumafx.json"));

        let err = FxError::parameter_range_error("sharpen", "amount", 9.5, "0.1..=5");
        let error_string = err.to_string();
        assert!(error_string.contains("sharpen"));
        assert!(error_string.contains("amount"));
        assert!(error_string.contains("9.5"));

        let err = FxError::config_value_error("JPEG quality", 150, "1-100", Some(95));
        assert!(err.to_string().contains("Recommended: 95"));

        let err = FxError::model_error_with_context(
            "load",
            Path::new("Models/enlighten.onnx"),
            "file not found",
            &["check the model directory"],
        );
        assert!(err.to_string().contains("Suggestions"));
    }
}
