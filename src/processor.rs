//! Request processor shared by the CLI and the HTTP server
//!
//! Owns the read-only pieces every request needs (configuration, operator
//! table, loaded models) and runs the decode → transform → encode pipeline.
//! Each call builds its own RNG and pixel grids, so one processor can serve
//! concurrent requests behind an `Arc`.

use crate::{
    backends::DefaultBackendFactory,
    config::ServiceConfig,
    error::{FxError, Result},
    models::{ModelLoader, ModelRegistry},
    operators::{Operator, OperatorContext, OperatorOutput, OperatorRegistry, OperatorRequest, ParamSet},
    services::{ImageIOService, OutputFormatHandler},
    types::{EncodedImage, OutputFormat, PixelGrid},
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, span, Level};

/// Decode → operator → encode pipeline
#[derive(Debug, Clone)]
pub struct FxProcessor {
    config: ServiceConfig,
    operators: OperatorRegistry,
    models: Arc<ModelRegistry>,
}

impl FxProcessor {
    /// Processor over an already loaded model registry
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: ServiceConfig, models: Arc<ModelRegistry>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            operators: OperatorRegistry::new(),
            models,
        })
    }

    /// Processor that resolves and loads its models from the configuration
    ///
    /// Models that cannot be loaded are logged and left out; only an invalid
    /// configuration fails.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let loader = ModelLoader::new(config.model_paths.clone());
        let models = ModelRegistry::load(
            &loader,
            &DefaultBackendFactory,
            config.backend,
            config.inference_threads,
        );
        info!(
            backend = %config.backend,
            loaded = ?models.loaded_kinds(),
            "Model registry ready"
        );
        Self::new(config, Arc::new(models))
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    #[must_use]
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Look up an operator and validate its raw parameters
    ///
    /// # Errors
    /// - `InvalidParameter` for unknown operators, unknown keys or bad values
    pub fn resolve<'a, I>(&self, operator: &str, raw_params: I) -> Result<(Operator, ParamSet)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let op = self.operators.get(operator)?;
        let params = op.resolve_params(raw_params)?;
        Ok((op, params))
    }

    /// Run one operator on a decoded grid
    ///
    /// Failures inside the operator that are not already classified come back
    /// as processing errors tagged with the operator name.
    ///
    /// # Errors
    /// - `ModelUnavailable` for learned operators without a loaded model
    /// - `Processing` for operator failures
    #[instrument(skip_all, fields(operator = %operator, width = grid.width(), height = grid.height()))]
    pub fn transform(&self, operator: Operator, grid: PixelGrid, params: ParamSet) -> Result<OperatorOutput> {
        let mut ctx = OperatorContext::new(&self.models, params.seed())
            .with_segmentation_max_dimension(self.config.segmentation_max_dimension);
        let request = OperatorRequest::new(operator, grid, params);
        request.run(&mut ctx).map_err(|e| e.at_stage(operator.name()))
    }

    /// Full pipeline: bytes in, encoded bytes out
    ///
    /// # Errors
    /// - `InvalidParameter` for unknown operators or bad parameters
    /// - `Decode` for unreadable input
    /// - Operator and encoder failures
    pub fn process<'a, I>(&self, bytes: &[u8], operator: &str, raw_params: I) -> Result<EncodedImage>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.process_with_format(bytes, operator, raw_params, None)
    }

    /// Full pipeline with a preferred output container
    ///
    /// A grid with alpha is always written as PNG regardless of `preferred`.
    ///
    /// # Errors
    /// See [`FxProcessor::process`].
    #[instrument(skip(self, bytes, raw_params), fields(input_bytes = bytes.len()))]
    pub fn process_with_format<'a, I>(
        &self,
        bytes: &[u8],
        operator: &str,
        raw_params: I,
        preferred: Option<OutputFormat>,
    ) -> Result<EncodedImage>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let total_start = Instant::now();
        let (op, params) = self.resolve(operator, raw_params)?;

        let decode_start = Instant::now();
        let grid = {
            let _span = span!(Level::DEBUG, "decode").entered();
            ImageIOService::decode(bytes)?
        };
        let decode_ms = decode_start.elapsed().as_secs_f64() * 1000.0;

        let transform_start = Instant::now();
        let output = self.transform(op, grid, params)?;
        let transform_ms = transform_start.elapsed().as_secs_f64() * 1000.0;

        let encode_start = Instant::now();
        let format = OutputFormatHandler::resolve(&output.grid, preferred.or(Some(output.format)));
        let encoded = {
            let _span = span!(Level::DEBUG, "encode", format = %format).entered();
            ImageIOService::encode(&output.grid, format, self.config.jpeg_quality)?
        };
        let encode_ms = encode_start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            operator = %op,
            decode_ms,
            transform_ms,
            encode_ms,
            total_ms = total_start.elapsed().as_secs_f64() * 1000.0,
            output_bytes = encoded.len(),
            "Request processed"
        );

        Ok(EncodedImage {
            bytes: encoded,
            format,
            dimensions: output.grid.dimensions(),
        })
    }

    /// Read `input`, transform it and write the result to `output`
    ///
    /// The output container follows the output extension when it names a
    /// supported format.
    ///
    /// # Errors
    /// - File I/O failures
    /// - Everything [`FxProcessor::process`] can return
    pub fn process_file<'a, I, P, Q>(&self, input: P, output: Q, operator: &str, raw_params: I) -> Result<EncodedImage>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let input = input.as_ref();
        let output = output.as_ref();
        let bytes = std::fs::read(input).map_err(|e| FxError::file_io_error("read input image", input, &e))?;
        let preferred = OutputFormatHandler::from_path(output).ok();
        let encoded = self.process_with_format(&bytes, operator, raw_params, preferred)?;
        ImageIOService::save_bytes(output, &encoded.bytes)?;
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackend;
    use crate::models::ModelKind;
    use crate::operators::NO_PARAMS;

    fn processor() -> FxProcessor {
        FxProcessor::new(ServiceConfig::default(), Arc::new(ModelRegistry::empty())).unwrap()
    }

    fn png_bytes(grid: &PixelGrid) -> Vec<u8> {
        ImageIOService::encode(grid, OutputFormat::Png, 95).unwrap()
    }

    #[test]
    fn test_invert_pipeline() {
        let input = png_bytes(&PixelGrid::filled(10, 12, &[255, 0, 0]));
        let out = processor().process(&input, "invert", NO_PARAMS).unwrap();
        assert_eq!(out.format, OutputFormat::Jpeg);
        assert_eq!(out.dimensions, (12, 10));

        let decoded = ImageIOService::decode(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 10));
        let px = [decoded.get(5, 5, 0), decoded.get(5, 5, 1), decoded.get(5, 5, 2)];
        assert!(px[0] < 8 && px[1] > 247 && px[2] > 247, "{px:?}");
    }

    #[test]
    fn test_opaque_rgba_upload_is_treated_as_rgb() {
        let input = png_bytes(&PixelGrid::filled(8, 8, &[255, 0, 0, 255]));
        let out = processor().process(&input, "invert", NO_PARAMS).unwrap();
        assert_eq!(out.format, OutputFormat::Jpeg);

        let decoded = ImageIOService::decode(&out.bytes).unwrap();
        assert_eq!(decoded.channels(), 3);
        let px = [decoded.get(4, 4, 0), decoded.get(4, 4, 1), decoded.get(4, 4, 2)];
        assert!(px[0] < 8 && px[1] > 247 && px[2] > 247, "{px:?}");
    }

    #[test]
    fn test_preferred_png_is_honoured() {
        let input = png_bytes(&PixelGrid::filled(6, 6, &[10, 20, 30]));
        let out = processor()
            .process_with_format(&input, "grayscale", NO_PARAMS, Some(OutputFormat::Png))
            .unwrap();
        assert_eq!(out.format, OutputFormat::Png);
        let decoded = ImageIOService::decode(&out.bytes).unwrap();
        assert_eq!(decoded.channels(), 1);
    }

    #[test]
    fn test_error_classes() {
        let p = processor();
        let input = png_bytes(&PixelGrid::filled(4, 4, &[1, 2, 3]));

        assert!(matches!(p.process(&input, "sepia", NO_PARAMS), Err(FxError::InvalidParameter(_))));
        assert!(matches!(
            p.process(&input, "sharpen", vec![("amount", "42")]),
            Err(FxError::InvalidParameter(_))
        ));
        assert!(matches!(p.process(&[], "invert", NO_PARAMS), Err(FxError::Decode(_))));
        assert!(matches!(
            p.process(&input, "anime", NO_PARAMS),
            Err(FxError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_seeded_requests_are_reproducible() {
        let p = processor();
        let input = png_bytes(&PixelGrid::filled(16, 16, &[120, 80, 40]));
        let a = p.process(&input, "frost", vec![("seed", "5")]).unwrap();
        let b = p.process(&input, "frost", vec![("seed", "5")]).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn test_learned_operator_with_loaded_model() {
        let mut models = ModelRegistry::empty();
        models.insert(ModelKind::Enlighten, Arc::new(MockBackend::identity()));
        let p = FxProcessor::new(ServiceConfig::default(), Arc::new(models)).unwrap();

        let input = png_bytes(&PixelGrid::filled(20, 30, &[50, 60, 70]));
        let out = p.process(&input, "low_light", NO_PARAMS).unwrap();
        assert_eq!(out.dimensions, (30, 20));
    }

    #[test]
    fn test_backend_failure_becomes_processing_error() {
        let mut models = ModelRegistry::empty();
        models.insert(ModelKind::Enlighten, Arc::new(MockBackend::failing()));
        let p = FxProcessor::new(ServiceConfig::default(), Arc::new(models)).unwrap();

        let input = png_bytes(&PixelGrid::filled(8, 8, &[1, 1, 1]));
        assert!(matches!(p.process(&input, "enlighten", NO_PARAMS), Err(FxError::Processing(_))));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = ServiceConfig::default();
        config.jpeg_quality = 0;
        assert!(FxProcessor::new(config, Arc::new(ModelRegistry::empty())).is_err());
    }
}
