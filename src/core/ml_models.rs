// ML model catalog and cache directory management
// Resolves pose model files on disk; models are never fetched over the network

use crate::models::pose::{ModelType, PoseError, PoseModel, PoseResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a model file comes from
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Must already be present in the cache directory
    Cached,
    /// Local file copied into the cache on first use
    LocalFile(PathBuf),
}

/// ML model metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// File name inside the cache directory
    pub name: String,
    pub version: String,
    pub source: ModelSource,
    /// Square input resolution expected by the network
    pub input_size: u32,
    pub size_bytes: Option<u64>,
}

impl ModelInfo {
    /// Approximate download size for messages, e.g. "~9 MB"
    pub fn size_description(&self) -> String {
        match self.size_bytes {
            Some(bytes) => format!("~{} MB", bytes / 1_000_000),
            None => "unknown size".to_string(),
        }
    }

    pub fn from_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = ModelSource::LocalFile(path.into());
        self
    }
}

/// Model manager for locating and caching ML models
pub struct ModelManager {
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a new model manager, creating the cache directory if needed
    pub fn new(cache_dir: impl Into<PathBuf>) -> PoseResult<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the local path for a model
    pub fn model_path(&self, model: &ModelInfo) -> PathBuf {
        self.cache_dir.join(&model.name)
    }

    pub fn is_cached(&self, model: &ModelInfo) -> bool {
        self.model_path(model).is_file()
    }

    /// Make sure the model file is in the cache and return its path
    pub async fn ensure_model(&self, model: &ModelInfo) -> PoseResult<PathBuf> {
        let model_path = self.model_path(model);

        if self.is_cached(model) {
            debug!(
                "Model {} v{} already cached at {:?}",
                model.name, model.version, model_path
            );
            return Ok(model_path);
        }

        match &model.source {
            ModelSource::Cached => Err(PoseError::ModelLoadFailed(format!(
                "model file {} (v{}, {}) not found in {}",
                model.name,
                model.version,
                model.size_description(),
                self.cache_dir.display()
            ))),
            ModelSource::LocalFile(path) => {
                if !path.is_file() {
                    return Err(PoseError::ModelLoadFailed(format!(
                        "model file {} does not exist",
                        path.display()
                    )));
                }

                info!(
                    "Copying model {} v{} ({}) from {:?}",
                    model.name,
                    model.version,
                    model.size_description(),
                    path
                );
                tokio::fs::copy(path, &model_path).await?;
                Ok(model_path)
            }
        }
    }
}

/// Catalog entry for a model family and size variant
pub fn model_info(model: PoseModel, model_type: ModelType) -> PoseResult<ModelInfo> {
    match (model, model_type) {
        (PoseModel::MoveNet, ModelType::Lite) => Ok(movenet::lightning()),
        (PoseModel::MoveNet, ModelType::Full | ModelType::Heavy) => Ok(movenet::thunder()),
        (other, _) => Err(PoseError::ModelLoadFailed(format!(
            "no ONNX export available for {} ({})",
            other.as_str(),
            model_type.as_str()
        ))),
    }
}

// ==============================================================================
// Predefined Model Configurations
// ==============================================================================

/// MoveNet single-pose exports
pub mod movenet {
    use super::*;

    pub fn lightning() -> ModelInfo {
        ModelInfo {
            name: "movenet-singlepose-lightning.onnx".to_string(),
            version: "4".to_string(),
            source: ModelSource::Cached,
            input_size: 192,
            size_bytes: Some(9_000_000), // ~9 MB
        }
    }

    pub fn thunder() -> ModelInfo {
        ModelInfo {
            name: "movenet-singlepose-thunder.onnx".to_string(),
            version: "4".to_string(),
            source: ModelSource::Cached,
            input_size: 256,
            size_bytes: Some(24_000_000), // ~24 MB
        }
    }
}
