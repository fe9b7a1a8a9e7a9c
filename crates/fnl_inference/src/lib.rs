use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub mod classifier;
pub mod error;
pub mod models;

pub use classifier::ClassifierService;
pub use error::ClassificationError;
pub use models::{create_model, ClassifierBackend, Prediction};

pub const DEFAULT_MODEL: &str = "mrm8488/bert-tiny-finetuned-fake-news-detection";
pub const DEFAULT_API_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    HuggingFace,
    Onnx,
    Dummy,
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "onnx" => Ok(Self::Onnx),
            "dummy" => Ok(Self::Dummy),
            other => Err(format!(
                "Unknown model backend '{}'. Available backends: huggingface (default), onnx, dummy",
                other
            )),
        }
    }
}

impl fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HuggingFace => "huggingface",
            Self::Onnx => "onnx",
            Self::Dummy => "dummy",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct Config {
    pub backend: ModelBackend,
    pub model_name: String,
    pub api_key: Option<String>,
    pub api_url: String,
    pub hub_url: String,
    /// Directory holding `model.onnx`, `tokenizer.json` and `config.json`.
    pub model_dir: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("model_name", &self.model_name)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("hub_url", &self.hub_url)
            .field("model_dir", &self.model_dir)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: ModelBackend::HuggingFace,
            model_name: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            hub_url: DEFAULT_HUB_URL.to_string(),
            model_dir: None,
        }
    }
}

pub mod prelude {
    pub use super::models::create_model;
    pub use super::{ClassificationError, ClassifierService, Config, ModelBackend};
    pub use fnl_core::{ClassificationResult, Error, Label, Result};
}
