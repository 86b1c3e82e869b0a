//! Model resolution and the process-wide model registry
//!
//! Model files are resolved from candidate paths once at startup. A model that
//! fails to resolve or load is logged and left out of the registry; learned
//! operators asking for it then fail with [`FxError::ModelUnavailable`].

use crate::error::{FxError, Result};
use crate::inference::{BackendFactory, BackendType, InferenceBackend};
use crate::utils::preprocessing::{
    InputSizing, Normalization, PreprocessingConfig, TensorLayout,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Default directory searched after any configured candidates
pub const DEFAULT_MODEL_DIR: &str = "Models";

/// The pre-trained networks the learned operators use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Low-light enhancement (EnlightenGAN-style)
    Enlighten,
    /// Anime style transfer (AnimeGAN-style)
    Anime,
}

impl ModelKind {
    pub const ALL: [Self; 2] = [Self::Enlighten, Self::Anime];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Enlighten => "enlighten",
            Self::Anime => "anime",
        }
    }

    /// File name looked up under each model directory
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Enlighten => "enlighten.onnx",
            Self::Anime => "animeganv3.onnx",
        }
    }

    /// Tensor conventions of the network
    #[must_use]
    pub fn profile(self) -> ModelProfile {
        let preprocessing = match self {
            Self::Enlighten => PreprocessingConfig {
                layout: TensorLayout::Nchw,
                normalization: Normalization::UnitRange,
                sizing: InputSizing::PadToMultiple(16),
            },
            Self::Anime => PreprocessingConfig {
                layout: TensorLayout::Nhwc,
                normalization: Normalization::SignedUnitRange,
                sizing: InputSizing::Resize {
                    width: 512,
                    height: 512,
                },
            },
        };
        ModelProfile {
            kind: self,
            preprocessing,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How tensors are prepared for and read back from a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub kind: ModelKind,
    pub preprocessing: PreprocessingConfig,
}

/// Metadata about a resolved model file
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub kind: ModelKind,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Source of model bytes
pub trait ModelProvider: fmt::Debug + Send + Sync {
    /// Read the serialized model
    ///
    /// # Errors
    /// - File missing or unreadable
    fn load_model_data(&self) -> Result<Vec<u8>>;

    /// Describe the model without loading it
    ///
    /// # Errors
    /// - File metadata unavailable
    fn get_model_info(&self) -> Result<ModelInfo>;
}

/// Model file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileModelProvider {
    kind: ModelKind,
    path: PathBuf,
}

impl FileModelProvider {
    #[must_use]
    pub fn new<P: AsRef<Path>>(kind: ModelKind, path: P) -> Self {
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelProvider for FileModelProvider {
    fn load_model_data(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| FxError::file_io_error("read model file", &self.path, &e))
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let metadata = fs::metadata(&self.path)
            .map_err(|e| FxError::file_io_error("inspect model file", &self.path, &e))?;
        Ok(ModelInfo {
            kind: self.kind,
            path: self.path.clone(),
            size_bytes: metadata.len(),
        })
    }
}

/// Resolves model files from candidate locations
#[derive(Debug, Clone, Default)]
pub struct ModelLoader {
    candidates: Vec<PathBuf>,
}

impl ModelLoader {
    /// Loader searching `candidates` first, then `./Models`
    ///
    /// A candidate may name a directory (the model's file name is appended)
    /// or a file whose name matches the model's file name.
    #[must_use]
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    fn search_paths(&self, kind: ModelKind) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(self.candidates.len() + 1);
        for candidate in &self.candidates {
            if candidate.file_name().and_then(|n| n.to_str()) == Some(kind.file_name()) {
                paths.push(candidate.clone());
            } else {
                paths.push(candidate.join(kind.file_name()));
            }
        }
        paths.push(Path::new(DEFAULT_MODEL_DIR).join(kind.file_name()));
        paths
    }

    /// First existing file for `kind`
    ///
    /// # Errors
    /// - No candidate path holds the model
    pub fn resolve(&self, kind: ModelKind) -> Result<FileModelProvider> {
        let searched = self.search_paths(kind);
        searched
            .iter()
            .find(|path| path.is_file())
            .map(|path| FileModelProvider::new(kind, path))
            .ok_or_else(|| {
                let tried: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
                let hint = format!("searched {}", tried.join(", "));
                FxError::model_error_with_context(
                    "resolve",
                    kind.file_name(),
                    "file not found",
                    &[hint.as_str()],
                )
            })
    }
}

/// A loaded network together with its tensor conventions
#[derive(Clone)]
pub struct LoadedModel {
    pub backend: Arc<dyn InferenceBackend>,
    pub profile: ModelProfile,
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("backend", &self.backend.name())
            .field("profile", &self.profile)
            .finish()
    }
}

/// Read-only set of loaded models, built once at process start
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<ModelKind, LoadedModel>,
}

impl ModelRegistry {
    /// Registry with no models; every learned operator reports unavailable
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve and load every known model
    ///
    /// Never fails: a model that cannot be loaded is logged and skipped.
    pub fn load(
        loader: &ModelLoader,
        factory: &dyn BackendFactory,
        backend_type: BackendType,
        threads: usize,
    ) -> Self {
        let mut registry = Self::empty();
        for kind in ModelKind::ALL {
            let start = Instant::now();
            let loaded = loader.resolve(kind).and_then(|provider| {
                let info = provider.get_model_info()?;
                let data = provider.load_model_data()?;
                let backend = factory.create_backend(backend_type, &data, threads)?;
                Ok((info, backend))
            });
            match loaded {
                Ok((info, backend)) => {
                    log::info!(
                        "🧠 Loaded model '{}' from {} ({} bytes, {} backend) in {}ms",
                        kind,
                        info.path.display(),
                        info.size_bytes,
                        backend.name(),
                        start.elapsed().as_millis()
                    );
                    registry.insert(kind, backend);
                },
                Err(e) => {
                    log::warn!("⚠️ Model '{kind}' unavailable: {e}");
                },
            }
        }
        registry
    }

    /// Register a ready backend for `kind`
    pub fn insert(&mut self, kind: ModelKind, backend: Arc<dyn InferenceBackend>) {
        self.models.insert(
            kind,
            LoadedModel {
                backend,
                profile: kind.profile(),
            },
        );
    }

    /// Loaded model for `kind`
    ///
    /// # Errors
    /// - [`FxError::ModelUnavailable`] when the model was not loaded
    pub fn get(&self, kind: ModelKind) -> Result<&LoadedModel> {
        self.models
            .get(&kind)
            .ok_or_else(|| FxError::model_unavailable(format!("model '{kind}' is not loaded")))
    }

    #[must_use]
    pub fn is_loaded(&self, kind: ModelKind) -> bool {
        self.models.contains_key(&kind)
    }

    /// Kinds currently loaded
    #[must_use]
    pub fn loaded_kinds(&self) -> Vec<ModelKind> {
        ModelKind::ALL
            .into_iter()
            .filter(|kind| self.is_loaded(*kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackend;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct MockFactory;

    impl BackendFactory for MockFactory {
        fn create_backend(
            &self,
            _backend_type: BackendType,
            model_data: &[u8],
            _threads: usize,
        ) -> Result<Arc<dyn InferenceBackend>> {
            if model_data.starts_with(b"ok") {
                Ok(Arc::new(MockBackend::identity()))
            } else {
                Err(FxError::model("unsupported model bytes"))
            }
        }

        fn available_backends(&self) -> Vec<BackendType> {
            vec![BackendType::Onnx]
        }
    }

    #[test]
    fn test_profiles() {
        let enlighten = ModelKind::Enlighten.profile();
        assert_eq!(enlighten.preprocessing.sizing, InputSizing::PadToMultiple(16));
        assert_eq!(enlighten.preprocessing.layout, TensorLayout::Nchw);

        let anime = ModelKind::Anime.profile();
        assert_eq!(anime.preprocessing.normalization, Normalization::SignedUnitRange);
        assert_eq!(anime.preprocessing.layout, TensorLayout::Nhwc);
    }

    #[test]
    fn test_resolve_prefers_configured_candidates() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("enlighten.onnx");
        fs::write(&model, b"ok").unwrap();

        let loader = ModelLoader::new(vec![dir.path().to_path_buf()]);
        let provider = loader.resolve(ModelKind::Enlighten).unwrap();
        assert_eq!(provider.path(), model.as_path());
        assert_eq!(provider.get_model_info().unwrap().size_bytes, 2);

        let direct = ModelLoader::new(vec![model.clone()]);
        assert_eq!(direct.resolve(ModelKind::Enlighten).unwrap().path(), model.as_path());
    }

    #[test]
    fn test_resolve_missing_model() {
        let dir = TempDir::new().unwrap();
        let loader = ModelLoader::new(vec![dir.path().join("nowhere")]);
        let err = loader.resolve(ModelKind::Anime).unwrap_err();
        assert!(matches!(err, FxError::Model(_)));
        assert!(err.to_string().contains("animeganv3.onnx"));
    }

    #[test]
    fn test_registry_load_skips_broken_models() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("enlighten.onnx"), b"ok model").unwrap();
        fs::write(dir.path().join("animeganv3.onnx"), b"corrupt").unwrap();

        let loader = ModelLoader::new(vec![dir.path().to_path_buf()]);
        let registry = ModelRegistry::load(&loader, &MockFactory, BackendType::Onnx, 1);

        assert!(registry.is_loaded(ModelKind::Enlighten));
        assert_eq!(registry.loaded_kinds(), vec![ModelKind::Enlighten]);
        assert!(matches!(
            registry.get(ModelKind::Anime),
            Err(FxError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_insert_attaches_profile() {
        let mut registry = ModelRegistry::empty();
        registry.insert(ModelKind::Anime, Arc::new(MockBackend::identity()));
        let model = registry.get(ModelKind::Anime).unwrap();
        assert_eq!(model.profile, ModelKind::Anime.profile());
        assert_eq!(model.backend.name(), "mock");
    }
}
