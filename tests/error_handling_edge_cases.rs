//! Error classification at the pipeline boundary

mod common;

use common::{plain_processor, png_bytes, test_card};
use lumafx::{ErrorKind, FxError, ImageIOService, OutputFormat, PixelGrid, NO_PARAMS};
use ndarray::Array3;

#[test]
fn test_empty_input_is_a_decode_error() {
    let err = ImageIOService::decode(&[]).unwrap_err();
    assert!(matches!(err, FxError::Decode(_)));
    assert_eq!(err.kind(), ErrorKind::Client);

    let err = plain_processor().process(b"GIF89a but not really", "invert", NO_PARAMS).unwrap_err();
    assert!(matches!(err, FxError::Decode(_)));
}

#[test]
fn test_zero_height_grid_is_an_encode_error() {
    let grid = PixelGrid::new(Array3::<u8>::zeros((0, 8, 3))).unwrap();
    for format in [OutputFormat::Jpeg, OutputFormat::Png] {
        let err = ImageIOService::encode(&grid, format, 90).unwrap_err();
        assert!(matches!(err, FxError::Encode(_)));
        assert_eq!(err.kind(), ErrorKind::Server);
    }
}

#[test]
fn test_unknown_operator_and_parameters() {
    let processor = plain_processor();
    let input = png_bytes(&test_card(8, 8));

    let err = processor.process(&input, "sepia", NO_PARAMS).unwrap_err();
    assert!(matches!(err, FxError::InvalidParameter(_)));
    assert!(err.to_string().contains("sepia"));

    let err = processor.process(&input, "pixelate", [("block", "4")]).unwrap_err();
    assert!(matches!(err, FxError::InvalidParameter(_)));

    let err = processor.process(&input, "pixelate", [("block_size", "0")]).unwrap_err();
    assert!(matches!(err, FxError::InvalidParameter(_)));

    let err = processor.process(&input, "denoise", [("strength", "ten")]).unwrap_err();
    assert!(matches!(err, FxError::InvalidParameter(_)));

    let err = processor.process(&input, "frost", [("seed", "-1")]).unwrap_err();
    assert!(matches!(err, FxError::InvalidParameter(_)));
}

#[test]
fn test_learned_operators_without_models() {
    let processor = plain_processor();
    let input = png_bytes(&test_card(8, 8));

    for name in ["enlighten", "anime", "ghibli", "low_light"] {
        let err = processor.process(&input, name, NO_PARAMS).unwrap_err();
        assert!(matches!(err, FxError::ModelUnavailable(_)), "{name}: {err}");
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}

#[test]
fn test_one_pixel_images() {
    let processor = plain_processor();
    let input = png_bytes(&PixelGrid::filled(1, 1, &[12, 34, 56]));
    for name in ["grayscale", "invert", "pixelate", "ascii_art"] {
        let out = processor
            .process(&input, name, NO_PARAMS)
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(out.dimensions, (1, 1), "{name}");
    }
}
