//! Service configuration

use crate::error::{FxError, Result};
use crate::inference::BackendType;
use crate::utils::NumericValidator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default JPEG quality for encoded results
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Default longest side of the image GrabCut works on
pub const DEFAULT_SEGMENTATION_MAX_DIMENSION: u32 = 256;

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";

/// Default upload limit (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Process-wide settings for the pipeline, the model loader and the server
///
/// Missing fields in a JSON file take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// JPEG quality for every lossy result (1-100)
    pub jpeg_quality: u8,

    /// GrabCut runs on a copy shrunk so its longer side is at most this
    pub segmentation_max_dimension: u32,

    /// Runtime used for the learned operators
    pub backend: BackendType,

    /// Inference threads (0 = auto-detect)
    pub inference_threads: usize,

    /// Directories or files searched for model files before `./Models`
    pub model_paths: Vec<PathBuf>,

    /// Address the HTTP server listens on
    pub bind_address: String,

    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            segmentation_max_dimension: DEFAULT_SEGMENTATION_MAX_DIMENSION,
            backend: BackendType::default(),
            inference_threads: 0,
            model_paths: Vec::new(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Create a builder for `ServiceConfig`
    ///
    /// # Examples
    /// ```rust
    /// use lumafx::ServiceConfig;
    ///
    /// let config = ServiceConfig::builder()
    ///     .jpeg_quality(90)
    ///     .segmentation_max_dimension(320)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.jpeg_quality, 90);
    /// ```
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    /// - File cannot be read
    /// - Invalid JSON or unknown value types
    /// - Values outside their valid ranges
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FxError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            FxError::invalid_config(format!("Failed to parse '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - JPEG quality outside 1-100
    /// - Segmentation size outside 16-4096
    /// - Thread count above the supported maximum
    /// - Unparsable bind address
    /// - Zero upload limit
    pub fn validate(&self) -> Result<()> {
        NumericValidator::validate_quality(self.jpeg_quality)?;

        if !(16..=4096).contains(&self.segmentation_max_dimension) {
            return Err(FxError::config_value_error(
                "segmentation max dimension",
                self.segmentation_max_dimension,
                "16-4096",
                Some(DEFAULT_SEGMENTATION_MAX_DIMENSION),
            ));
        }

        NumericValidator::validate_thread_count(self.inference_threads)?;

        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(FxError::invalid_config(format!(
                "Invalid bind address '{}' (expected host:port)",
                self.bind_address
            )));
        }

        if self.max_upload_bytes == 0 {
            return Err(FxError::config_value_error(
                "max upload bytes",
                self.max_upload_bytes,
                "> 0",
                Some(DEFAULT_MAX_UPLOAD_BYTES),
            ));
        }

        Ok(())
    }
}

/// Builder for `ServiceConfig`
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from a file)
    #[must_use]
    pub fn from_config(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Set JPEG quality, clamped to 1-100
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    #[must_use]
    pub fn segmentation_max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.segmentation_max_dimension = max_dimension;
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set inference threads (0 = auto-detect)
    #[must_use]
    pub fn inference_threads(mut self, threads: usize) -> Self {
        self.config.inference_threads = threads;
        self
    }

    /// Add a model search location, searched in insertion order
    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_paths.push(path.into());
        self
    }

    #[must_use]
    pub fn bind_address<S: Into<String>>(mut self, address: S) -> Self {
        self.config.bind_address = address.into();
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`ServiceConfig::validate`].
    pub fn build(self) -> Result<ServiceConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.jpeg_quality, 95);
        assert_eq!(config.segmentation_max_dimension, 256);
        assert_eq!(config.backend, BackendType::Onnx);
        assert!(config.model_paths.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ServiceConfig::builder()
            .jpeg_quality(80)
            .backend(BackendType::Tract)
            .model_path("/opt/models")
            .model_path("./weights")
            .bind_address("0.0.0.0:9000")
            .build()
            .unwrap();

        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.backend, BackendType::Tract);
        assert_eq!(
            config.model_paths,
            vec![PathBuf::from("/opt/models"), PathBuf::from("./weights")]
        );
    }

    #[test]
    fn test_builder_clamps_quality() {
        let config = ServiceConfig::builder().jpeg_quality(0).build().unwrap();
        assert_eq!(config.jpeg_quality, 1);
        let config = ServiceConfig::builder().jpeg_quality(200).build().unwrap();
        assert_eq!(config.jpeg_quality, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ServiceConfig::default();
        config.jpeg_quality = 0;
        assert!(matches!(config.validate(), Err(FxError::InvalidConfig(_))));

        let mut config = ServiceConfig::default();
        config.segmentation_max_dimension = 8;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.bind_address = "not an address".to_string();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "jpeg_quality": 70, "backend": "tract" }}"#).unwrap();

        let config = ServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.backend, BackendType::Tract);
        assert_eq!(config.segmentation_max_dimension, 256);
    }

    #[test]
    fn test_invalid_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "jpeg_quality": 150 }}"#).unwrap();
        assert!(ServiceConfig::from_file(file.path()).is_err());

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ServiceConfig::from_file(file.path()),
            Err(FxError::InvalidConfig(_))
        ));

        assert!(matches!(
            ServiceConfig::from_file("/definitely/missing/lumafx.json"),
            Err(FxError::Io(_))
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = ServiceConfig::builder().inference_threads(4).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
