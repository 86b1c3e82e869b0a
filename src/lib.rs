#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # lumafx
//!
//! Image stylization and enhancement filters behind one decode → operator →
//! encode pipeline, with learned operators running on ONNX Runtime or Tract.
//!
//! ## Features
//!
//! - **Tone operators**: grayscale, invert, auto brightness, CLAHE enhancement,
//!   shadow removal, x-ray and heat maps
//! - **Spatial operators**: sharpen, denoise, Canny edges, edge enhancement,
//!   pixelation
//! - **Stylization**: comic, cartoon, oil paint, sketches, water color, retro
//!   palettes, halftone, cross-hatching, neon, frost, kaleidoscope, ASCII art
//! - **Segmentation**: GrabCut background removal and background blur
//! - **Learned operators**: low-light enhancement and anime stylization
//! - **CLI and HTTP server**: `lumafx apply`, `lumafx list`, `lumafx serve`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumafx::{FxProcessor, OutputFormatHandler, ServiceConfig};
//!
//! # fn example(upload: &[u8]) -> anyhow::Result<()> {
//! let processor = FxProcessor::from_config(ServiceConfig::default())?;
//! let result = processor.process(upload, "sharpen", [("amount", "0.8")])?;
//! let extension = OutputFormatHandler::get_extension(result.format);
//! std::fs::write(format!("out.{extension}"), &result.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `server` (default): axum HTTP front end
//! - `tracing-json`: JSON log output
//! - `webp-support`: WebP input decoding
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! lumafx = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod filters;
pub mod inference;
pub mod models;
pub mod operators;
pub mod processor;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
pub use backends::DefaultBackendFactory;
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{ErrorKind, FxError, Result};
pub use inference::{BackendFactory, BackendType, InferenceBackend};
pub use models::{ModelKind, ModelLoader, ModelRegistry};
pub use operators::{Operator, OperatorFamily, OperatorRegistry, ParamSet, NO_PARAMS};
pub use processor::FxProcessor;
pub use services::{ImageIOService, OutputFormatHandler};
pub use types::{EncodedImage, OutputFormat, PixelGrid, SegmentationMask};
pub use utils::NumericValidator;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Apply a non-learned operator to a `DynamicImage`
///
/// Runs without any models loaded, so learned operators fail with
/// [`FxError::ModelUnavailable`]; use an [`FxProcessor`] built with
/// [`FxProcessor::from_config`] for those.
///
/// # Examples
/// ```rust
/// use image::{DynamicImage, RgbImage};
///
/// let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 0])));
/// let out = lumafx::apply_to_image(&img, "invert", lumafx::NO_PARAMS).unwrap();
/// assert_eq!(out.to_rgb8().get_pixel(0, 0).0, [0, 255, 255]);
/// ```
pub fn apply_to_image<'a, I>(image: &image::DynamicImage, operator: &str, params: I) -> Result<image::DynamicImage>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let processor = FxProcessor::new(ServiceConfig::default(), Arc::new(ModelRegistry::empty()))?;
    let (op, params) = processor.resolve(operator, params)?;
    let output = processor.transform(op, PixelGrid::from_decoded(image), params)?;
    output.grid.to_dynamic()
}

/// Read an encoded image from an async stream and run it through `processor`
///
/// # Examples
/// ```rust,no_run
/// use lumafx::{process_reader, FxProcessor, ServiceConfig, NO_PARAMS};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let processor = FxProcessor::from_config(ServiceConfig::default())?;
/// let file = File::open("photo.jpg").await?;
/// let result = process_reader(file, &processor, "cartoon", NO_PARAMS).await?;
/// tokio::fs::write("cartoon.jpg", &result.bytes).await?;
/// # Ok(())
/// # }
/// ```
pub async fn process_reader<'a, R, I>(
    mut reader: R,
    processor: &FxProcessor,
    operator: &str,
    params: I,
) -> Result<EncodedImage>
where
    R: AsyncRead + Unpin,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;

    processor.process(&buffer, operator, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    #[test]
    fn test_apply_to_image_keeps_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, image::Rgb([10, 200, 30])));
        let out = apply_to_image(&img, "pixelate", [("block_size", "5")]).unwrap();
        assert_eq!((out.width(), out.height()), (20, 10));
    }

    #[test]
    fn test_apply_to_image_learned_needs_model() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(matches!(
            apply_to_image(&img, "anime", NO_PARAMS),
            Err(FxError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_process_reader() {
        let grid = PixelGrid::filled(6, 9, &[0, 0, 0]);
        let png = ImageIOService::encode(&grid, OutputFormat::Png, 95).unwrap();
        let processor = FxProcessor::new(ServiceConfig::default(), Arc::new(ModelRegistry::empty())).unwrap();

        let result = process_reader(std::io::Cursor::new(png), &processor, "grayscale", NO_PARAMS)
            .await
            .unwrap();
        assert_eq!(result.dimensions, (9, 6));
        assert_eq!(result.format, OutputFormat::Jpeg);
    }
}
