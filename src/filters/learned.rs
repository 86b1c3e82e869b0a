//! Operators backed by a pre-trained network

use crate::error::Result;
use crate::inference::InferenceBackend;
use crate::models::ModelProfile;
use crate::types::PixelGrid;
use crate::utils::preprocessing::ImagePreprocessor;
use std::time::Instant;

/// Run one forward pass of `backend` over `grid`
///
/// The grid is padded or resized and normalized according to `profile`, and
/// the model output is mapped back to an RGB grid of the input's size.
///
/// # Errors
/// - Empty or oversized input
/// - Backend failure
/// - Output tensor that does not describe a 3-channel image
pub fn infer(grid: &PixelGrid, backend: &dyn InferenceBackend, profile: &ModelProfile) -> Result<PixelGrid> {
    let config = &profile.preprocessing;

    let start = Instant::now();
    let prepared = ImagePreprocessor::preprocess(grid, config)?;
    let preprocess_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    let output = backend.infer(&prepared.tensor)?;
    let inference_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    let result = ImagePreprocessor::postprocess(&output, &prepared, config)?;
    let postprocess_ms = start.elapsed().as_secs_f64() * 1000.0;

    log::debug!(
        "{} via {}: preprocess {:.1}ms, inference {:.1}ms, postprocess {:.1}ms",
        profile.kind,
        backend.name(),
        preprocess_ms,
        inference_ms,
        postprocess_ms
    );
    Ok(result)
}
