//! Configuration, file processing and model loading through the public API

mod common;

use common::{png_bytes, test_card};
use lumafx::{
    BackendType, FxError, FxProcessor, ImageIOService, ModelKind, OutputFormat, ServiceConfig, NO_PARAMS,
};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_config_file_drives_the_processor() -> lumafx::Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"{{ "jpeg_quality": 40, "segmentation_max_dimension": 64, "backend": "tract" }}"#
    )?;

    let config = ServiceConfig::from_file(file.path())?;
    assert_eq!(config.jpeg_quality, 40);
    assert_eq!(config.backend, BackendType::Tract);

    let processor = FxProcessor::from_config(config)?;
    assert_eq!(processor.config().segmentation_max_dimension, 64);
    assert!(processor.models().loaded_kinds().is_empty());

    let out = processor.process(&png_bytes(&test_card(40, 40)), "bgblur", NO_PARAMS)?;
    assert_eq!(out.dimensions, (40, 40));
    Ok(())
}

#[test]
fn test_unreadable_model_files_leave_models_unavailable() -> lumafx::Result<()> {
    let dir = TempDir::new()?;
    for kind in ModelKind::ALL {
        std::fs::write(dir.path().join(kind.file_name()), b"definitely not onnx")?;
    }

    let config = ServiceConfig::builder().model_path(dir.path()).build()?;
    let processor = FxProcessor::from_config(config)?;
    assert!(processor.models().loaded_kinds().is_empty());

    let err = processor
        .process(&png_bytes(&test_card(16, 16)), "enlighten", NO_PARAMS)
        .unwrap_err();
    assert!(matches!(err, FxError::ModelUnavailable(_)));
    Ok(())
}

#[test]
fn test_process_file_follows_output_extension() -> lumafx::Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("card.png");
    std::fs::write(&input, png_bytes(&test_card(30, 20)))?;

    let processor = common::plain_processor();

    let png_out = dir.path().join("edges.png");
    let result = processor.process_file(&input, &png_out, "edges", NO_PARAMS)?;
    assert_eq!(result.format, OutputFormat::Png);
    let decoded = ImageIOService::load_image(&png_out)?;
    assert_eq!((decoded.width(), decoded.height()), (20, 30));

    let jpg_out = dir.path().join("comic.jpg");
    let result = processor.process_file(&input, &jpg_out, "comic", NO_PARAMS)?;
    assert_eq!(result.format, OutputFormat::Jpeg);
    assert!(std::fs::metadata(&jpg_out)?.len() > 0);
    Ok(())
}

#[test]
fn test_missing_input_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = common::plain_processor()
        .process_file(dir.path().join("missing.png"), dir.path().join("out.png"), "invert", NO_PARAMS)
        .unwrap_err();
    assert!(matches!(err, FxError::Io(_)));
}

#[test]
fn test_lower_quality_gives_smaller_jpeg() -> lumafx::Result<()> {
    let input = png_bytes(&test_card(64, 64));
    let high = FxProcessor::new(
        ServiceConfig::builder().jpeg_quality(95).build()?,
        std::sync::Arc::default(),
    )?;
    let low = FxProcessor::new(
        ServiceConfig::builder().jpeg_quality(10).build()?,
        std::sync::Arc::default(),
    )?;

    let a = high.process(&input, "sharpen", NO_PARAMS)?;
    let b = low.process(&input, "sharpen", NO_PARAMS)?;
    assert!(b.bytes.len() < a.bytes.len());
    Ok(())
}
