use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ort::session::Session;
use serde::Deserialize;

use super::{ClassifierBackend, Prediction};
use crate::ClassificationError;

#[derive(Deserialize, Default)]
struct ModelConfig {
    #[serde(default)]
    id2label: HashMap<String, String>,
    max_position_embeddings: Option<usize>,
}

/// Local sequence classifier run through ONNX Runtime.
///
/// The model directory must contain `model.onnx`, `tokenizer.json` and the
/// Hugging Face `config.json` carrying `id2label`.
///
/// Inference runs on the blocking pool, see [`super::run_blocking`].
pub struct OnnxModel {
    runner: Arc<OnnxRunner>,
    max_length: Option<usize>,
    model_dir: PathBuf,
}

/// The parts inference needs, shared with blocking tasks.
/// `ort::Session::run` takes `&mut self`, so the session sits behind a Mutex.
struct OnnxRunner {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    id2label: HashMap<usize, String>,
}

impl fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxModel")
            .field("model_dir", &self.model_dir)
            .field("labels", &self.runner.id2label)
            .field("max_length", &self.max_length)
            .finish()
    }
}

fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&l| ((l - max) as f64).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Cuts token ids to `max_length`, keeping the trailing separator token.
fn truncate_ids<T: Copy>(ids: &mut Vec<T>, max_length: usize) {
    if ids.len() <= max_length || max_length == 0 {
        return;
    }
    let last = ids[ids.len() - 1];
    ids.truncate(max_length - 1);
    ids.push(last);
}

impl OnnxModel {
    pub fn load(model_dir: &Path) -> Result<Self, ClassificationError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let config_path = model_dir.join("config.json");

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(ClassificationError::Load(format!("missing {}", path.display())));
            }
        }

        let config: ModelConfig = match std::fs::read_to_string(&config_path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| ClassificationError::Load(format!("config.json: {}", e)))?,
            Err(_) => ModelConfig::default(),
        };

        let session = Session::builder()
            .map_err(|e: ort::Error| ClassificationError::Load(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e: ort::Error| ClassificationError::Load(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| ClassificationError::Load(format!("ONNX load failed: {e}")))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ClassificationError::Load(format!("Tokenizer load failed: {e}")))?;

        let id2label = config
            .id2label
            .into_iter()
            .filter_map(|(id, label)| id.parse::<usize>().ok().map(|id| (id, label)))
            .collect();

        tracing::info!("🧠 ONNX classifier loaded from {}", model_dir.display());

        Ok(Self {
            runner: Arc::new(OnnxRunner {
                session: Mutex::new(session),
                tokenizer,
                id2label,
            }),
            max_length: config.max_position_embeddings,
            model_dir: model_dir.to_path_buf(),
        })
    }
}

impl OnnxRunner {
    fn infer(&self, snippet: &str, max_length: usize) -> Result<Prediction, ClassificationError> {
        use ort::value::TensorRef;

        let encoding = self
            .tokenizer
            .encode(snippet, true)
            .map_err(|e| ClassificationError::Inference(format!("Tokenization failed: {e}")))?;

        let mut input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mut attention_mask: Vec<i64> =
            encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
        let mut token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        truncate_ids(&mut input_ids, max_length);
        truncate_ids(&mut attention_mask, max_length);
        truncate_ids(&mut token_type_ids, max_length);

        let seq_len = input_ids.len();
        let to_array = |values: Vec<i64>| {
            ndarray::Array2::from_shape_vec((1, seq_len), values)
                .map_err(|e| ClassificationError::Inference(e.to_string()))
        };
        let ids_array = to_array(input_ids)?;
        let mask_array = to_array(attention_mask)?;
        let type_array = to_array(token_type_ids)?;

        let ids_tensor = TensorRef::from_array_view(&ids_array)
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;
        let mask_tensor = TensorRef::from_array_view(&mask_array)
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;
        let type_tensor = TensorRef::from_array_view(&type_array)
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassificationError::Inference("Session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
            .map_err(|e| ClassificationError::Inference(format!("ONNX inference failed: {e}")))?;

        // Logits of shape [1, num_labels]
        let (_shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassificationError::Inference(format!("Output extraction: {e}")))?;

        let probabilities = softmax(logits);
        let (index, score) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, p)| (i, *p))
            .ok_or_else(|| ClassificationError::Response("model produced no logits".to_string()))?;

        let label = self
            .id2label
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{}", index));
        Ok(Prediction { label, score })
    }
}

#[async_trait::async_trait]
impl ClassifierBackend for OnnxModel {
    fn name(&self) -> &str {
        "ONNX"
    }

    fn model_max_length(&self) -> Option<usize> {
        self.max_length
    }

    async fn predict(&self, snippet: &str, max_length: usize) -> Result<Prediction, ClassificationError> {
        let runner = Arc::clone(&self.runner);
        let snippet = snippet.to_string();
        super::run_blocking(move || runner.infer(&snippet, max_length)).await
    }
}
