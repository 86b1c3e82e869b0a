//! Shared helpers for the integration tests

#![allow(dead_code)]

use lumafx::{
    FxProcessor, ImageIOService, InferenceBackend, ModelKind, ModelRegistry, OutputFormat, PixelGrid,
    ServiceConfig,
};
use ndarray::Array4;
use std::sync::Arc;

/// Backend that returns its input unchanged
pub struct IdentityBackend;

impl InferenceBackend for IdentityBackend {
    fn infer(&self, input: &Array4<f32>) -> lumafx::Result<Array4<f32>> {
        Ok(input.clone())
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Processor without models
pub fn plain_processor() -> FxProcessor {
    FxProcessor::new(ServiceConfig::default(), Arc::new(ModelRegistry::empty())).unwrap()
}

/// Processor with every learned model replaced by [`IdentityBackend`]
pub fn processor_with_identity_models() -> FxProcessor {
    let mut models = ModelRegistry::empty();
    for kind in ModelKind::ALL {
        models.insert(kind, Arc::new(IdentityBackend));
    }
    FxProcessor::new(ServiceConfig::default(), Arc::new(models)).unwrap()
}

/// Smooth RGB test card with a bright square in the middle
pub fn test_card(height: usize, width: usize) -> PixelGrid {
    let mut raw = Vec::with_capacity(height * width * 3);
    for y in 0..height {
        for x in 0..width {
            let inside = y > height / 3 && y < 2 * height / 3 && x > width / 3 && x < 2 * width / 3;
            if inside {
                raw.extend_from_slice(&[230, 200, 40]);
            } else {
                raw.push((x * 255 / width.max(1)) as u8);
                raw.push((y * 255 / height.max(1)) as u8);
                raw.push(90);
            }
        }
    }
    PixelGrid::from_raw(height, width, 3, raw).unwrap()
}

pub fn png_bytes(grid: &PixelGrid) -> Vec<u8> {
    ImageIOService::encode(grid, OutputFormat::Png, 95).unwrap()
}
