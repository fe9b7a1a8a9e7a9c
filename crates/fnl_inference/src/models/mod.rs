use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ClassificationError, Config, ModelBackend};

pub mod dummy;
pub mod huggingface;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use dummy::DummyModel;
pub use huggingface::HuggingFaceModel;
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

/// Raw output of a text-classification model, before label mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
}

#[async_trait]
pub trait ClassifierBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Maximum number of input positions the model was configured with, if known.
    fn model_max_length(&self) -> Option<usize>;

    /// Classify `snippet`, truncating the tokenized input to `max_length`.
    async fn predict(&self, snippet: &str, max_length: usize) -> Result<Prediction, ClassificationError>;
}

/// Runs synchronous model work (tokenisation, local inference) on tokio's
/// blocking pool. A panic in `work` comes back as an inference error.
pub async fn run_blocking<T, F>(work: F) -> Result<T, ClassificationError>
where
    F: FnOnce() -> Result<T, ClassificationError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ClassificationError::Inference(format!("Inference task failed: {e}")))?
}

pub async fn create_model(config: &Config) -> Result<Arc<dyn ClassifierBackend>, ClassificationError> {
    match config.backend {
        ModelBackend::HuggingFace => Ok(Arc::new(HuggingFaceModel::load(config).await?)),
        ModelBackend::Dummy => Ok(Arc::new(DummyModel::new())),
        #[cfg(feature = "onnx")]
        ModelBackend::Onnx => {
            let dir = config.model_dir.clone().ok_or_else(|| {
                ClassificationError::Load("MODEL_DIR is required for the onnx backend".to_string())
            })?;
            // Session construction reads the weights from disk.
            let model = tokio::task::spawn_blocking(move || OnnxModel::load(&dir))
                .await
                .map_err(|e| ClassificationError::Load(e.to_string()))??;
            Ok(Arc::new(model))
        }
        #[cfg(not(feature = "onnx"))]
        ModelBackend::Onnx => Err(ClassificationError::Unavailable(
            "this build has no ONNX support; enable the `onnx` feature".to_string(),
        )),
    }
}
