//! Bitmap codec service
//!
//! The only place where bytes become pixel grids and pixel grids become
//! bytes. Everything behind this boundary works on [`PixelGrid`].

use crate::{
    error::{FxError, Result},
    types::{OutputFormat, PixelGrid},
};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::path::Path;

/// Service for decoding and encoding images
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an in-memory image into a pixel grid
    ///
    /// Grayscale inputs keep one channel and everything else becomes RGB. An
    /// input alpha channel is dropped. 16-bit samples are narrowed to 8 bits.
    ///
    /// # Errors
    /// Returns [`FxError::Decode`] if the bytes are empty, truncated or not a
    /// recognized container. A partial grid is never returned.
    ///
    /// # Examples
    /// ```rust
    /// use lumafx::services::ImageIOService;
    ///
    /// assert!(ImageIOService::decode(&[]).is_err());
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<PixelGrid> {
        if bytes.is_empty() {
            return Err(FxError::decode("input is empty"));
        }

        let format = image::guess_format(bytes)
            .map_err(|e| FxError::decode(format!("unrecognized image container: {e}")))?;

        let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            FxError::decode(format!("failed to decode {:?} image ({} bytes): {e}", format, bytes.len()))
        })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(FxError::decode("decoded image has zero width or height"));
        }

        log::debug!(
            "Decoded {:?} image {}x{} ({:?})",
            format,
            image.width(),
            image.height(),
            image.color()
        );
        Ok(PixelGrid::from_decoded(&image))
    }

    /// Encode a pixel grid into the requested container
    ///
    /// # Arguments
    /// * `grid` - Pixels to serialize
    /// * `format` - Target container
    /// * `jpeg_quality` - Quality used when `format` is JPEG (1-100)
    ///
    /// # Errors
    /// Returns [`FxError::Encode`] for empty grids, for alpha grids sent to
    /// JPEG, and for encoder failures.
    pub fn encode(grid: &PixelGrid, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        if grid.is_empty() {
            return Err(FxError::encode(format!(
                "cannot encode an empty {}x{} grid",
                grid.width(),
                grid.height()
            )));
        }

        let color = match (grid.channels(), format) {
            (1, _) => ExtendedColorType::L8,
            (3, _) => ExtendedColorType::Rgb8,
            (4, OutputFormat::Png) => ExtendedColorType::Rgba8,
            (4, OutputFormat::Jpeg) => {
                return Err(FxError::encode("JPEG cannot carry an alpha channel; use PNG"));
            },
            (n, _) => {
                return Err(FxError::encode(format!("unsupported channel count {n}")));
            },
        };

        let (width, height) = grid.dimensions();
        let raw = grid.to_raw();
        let mut buffer = Vec::new();

        match format {
            OutputFormat::Jpeg => {
                let quality = jpeg_quality.clamp(1, 100);
                JpegEncoder::new_with_quality(&mut buffer, quality)
                    .write_image(&raw, width, height, color)
                    .map_err(|e| FxError::encode(format!("JPEG encoding failed: {e}")))?;
            },
            OutputFormat::Png => {
                PngEncoder::new(&mut buffer)
                    .write_image(&raw, width, height, color)
                    .map_err(|e| FxError::encode(format!("PNG encoding failed: {e}")))?;
            },
        }

        log::debug!(
            "Encoded {}x{} grid as {} ({} bytes)",
            width,
            height,
            format,
            buffer.len()
        );
        Ok(buffer)
    }

    /// Read and decode an image file
    ///
    /// # Errors
    /// - File cannot be read
    /// - Contents cannot be decoded
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<PixelGrid> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)
            .map_err(|e| FxError::file_io_error("read image file", path_ref, &e))?;
        Self::decode(&data)
    }

    /// Write encoded bytes to disk, creating the parent directory if needed
    ///
    /// # Errors
    /// - Parent directory cannot be created or the file cannot be written
    pub fn save_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| FxError::file_io_error("create output directory", parent, &e))?;
            }
        }

        std::fs::write(path_ref, bytes)
            .map_err(|e| FxError::file_io_error("write image file", path_ref, &e))?;
        log::info!("Saved {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_decode_empty_is_decode_error() {
        let err = ImageIOService::decode(&[]).unwrap_err();
        assert!(matches!(err, FxError::Decode(_)));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = ImageIOService::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, FxError::Decode(_)));
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let grid = PixelGrid::filled(16, 16, &[10, 20, 30]);
        let bytes = ImageIOService::encode(&grid, OutputFormat::Png, 95).unwrap();
        let err = ImageIOService::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, FxError::Decode(_)));
    }

    #[test]
    fn test_encode_zero_height_is_encode_error() {
        let grid = PixelGrid::new(Array3::<u8>::zeros((0, 10, 3))).unwrap();
        let err = ImageIOService::encode(&grid, OutputFormat::Jpeg, 95).unwrap_err();
        assert!(matches!(err, FxError::Encode(_)));
    }

    #[test]
    fn test_jpeg_rejects_alpha() {
        let grid = PixelGrid::filled(4, 4, &[1, 2, 3, 4]);
        let err = ImageIOService::encode(&grid, OutputFormat::Jpeg, 95).unwrap_err();
        assert!(matches!(err, FxError::Encode(_)));
        assert!(ImageIOService::encode(&grid, OutputFormat::Png, 95).is_ok());
    }

    #[test]
    fn test_png_is_lossless_for_opaque_layouts() {
        for pixel in [&[7u8][..], &[1, 2, 3][..]] {
            let grid = PixelGrid::filled(5, 3, pixel);
            let bytes = ImageIOService::encode(&grid, OutputFormat::Png, 95).unwrap();
            assert_eq!(ImageIOService::decode(&bytes).unwrap(), grid);
        }
    }

    #[test]
    fn test_decode_drops_input_alpha() {
        let grid = PixelGrid::filled(5, 3, &[9, 8, 7, 6]);
        let bytes = ImageIOService::encode(&grid, OutputFormat::Png, 95).unwrap();
        let decoded = ImageIOService::decode(&bytes).unwrap();
        assert_eq!(decoded, PixelGrid::filled(5, 3, &[9, 8, 7]));
    }

    #[test]
    fn test_jpeg_keeps_dimensions() {
        let grid = PixelGrid::filled(33, 17, &[200, 100, 50]);
        let bytes = ImageIOService::encode(&grid, OutputFormat::Jpeg, 95).unwrap();
        let decoded = ImageIOService::decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (17, 33));
        assert_eq!(decoded.channels(), 3);
    }
}
