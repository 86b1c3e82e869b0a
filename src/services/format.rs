//! Output format selection
//!
//! Decides which container a result is written in and exposes the matching
//! MIME type and file extension.

use crate::error::{FxError, Result};
use crate::types::{OutputFormat, PixelGrid};
use std::path::Path;

/// Service for choosing and describing output formats
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Container for a transformed grid: PNG if it carries alpha, JPEG otherwise
    ///
    /// # Examples
    /// ```rust
    /// use lumafx::{services::OutputFormatHandler, OutputFormat, PixelGrid};
    ///
    /// let rgba = PixelGrid::filled(2, 2, &[0, 0, 0, 255]);
    /// assert_eq!(OutputFormatHandler::format_for(&rgba), OutputFormat::Png);
    /// ```
    #[must_use]
    pub fn format_for(grid: &PixelGrid) -> OutputFormat {
        if grid.has_alpha() {
            OutputFormat::Png
        } else {
            OutputFormat::Jpeg
        }
    }

    /// Resolve a caller preference against the grid
    ///
    /// Alpha always forces PNG; otherwise the preference wins.
    #[must_use]
    pub fn resolve(grid: &PixelGrid, preferred: Option<OutputFormat>) -> OutputFormat {
        match preferred {
            Some(format) if !grid.has_alpha() || Self::supports_transparency(format) => format,
            _ => Self::format_for(grid),
        }
    }

    /// MIME type for HTTP responses
    #[must_use]
    pub fn content_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// File extension without the dot
    ///
    /// # Examples
    /// ```rust
    /// use lumafx::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Infer the output format from a file name
    ///
    /// # Errors
    /// Returns `InvalidParameter` for extensions other than png, jpg or jpeg.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<OutputFormat> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(FxError::invalid_parameter(format!(
                "Unsupported output extension '{}' (expected png, jpg or jpeg)",
                other
            ))),
        }
    }
}
