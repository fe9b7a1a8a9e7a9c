use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ClassifierBackend, Prediction};
use crate::{ClassificationError, Config};

#[derive(Serialize)]
struct InferenceParameters {
    truncation: bool,
    max_length: usize,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<Prediction>>),
    Flat(Vec<Prediction>),
    Failure { error: String },
}

#[derive(Deserialize)]
struct TokenizerConfig {
    model_max_length: Option<serde_json::Value>,
}

/// Text classification through the Hugging Face Inference API.
pub struct HuggingFaceModel {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    model_name: String,
    max_length: Option<usize>,
}

impl fmt::Debug for HuggingFaceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("model_name", &self.model_name)
            .field("max_length", &self.max_length)
            .finish()
    }
}

impl HuggingFaceModel {
    /// Builds the client and reads the model's tokenizer limits from the hub.
    pub async fn load(config: &Config) -> Result<Self, ClassificationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ClassificationError::Load(e.to_string()))?;

        let mut model = Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model_name: config.model_name.clone(),
            max_length: None,
        };

        let hub_url = config.hub_url.trim_end_matches('/');
        match model.fetch_max_length(hub_url).await {
            Ok(max_length) => model.max_length = max_length,
            Err(e) => tracing::warn!(
                "Could not read tokenizer config for {}: {}; assuming defaults",
                model.model_name,
                e
            ),
        }

        tracing::info!(
            "🧠 Hugging Face model {} ready (max length {:?})",
            model.model_name,
            model.max_length
        );
        Ok(model)
    }

    async fn fetch_max_length(&self, hub_url: &str) -> Result<Option<usize>, ClassificationError> {
        let url = format!(
            "{}/{}/resolve/main/tokenizer_config.json",
            hub_url, self.model_name
        );
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let config = request
            .send()
            .await?
            .error_for_status()?
            .json::<TokenizerConfig>()
            .await?;

        // Tokenizers without a limit report a huge sentinel; the classifier caps it.
        Ok(config
            .model_max_length
            .and_then(|v| v.as_f64())
            .filter(|n| *n >= 1.0)
            .map(|n| n.min(usize::MAX as f64) as usize))
    }
}

#[async_trait::async_trait]
impl ClassifierBackend for HuggingFaceModel {
    fn name(&self) -> &str {
        "HuggingFace"
    }

    fn model_max_length(&self) -> Option<usize> {
        self.max_length
    }

    async fn predict(&self, snippet: &str, max_length: usize) -> Result<Prediction, ClassificationError> {
        let body = InferenceRequest {
            inputs: snippet,
            parameters: InferenceParameters {
                truncation: true,
                max_length,
            },
            options: InferenceOptions { wait_for_model: true },
        };

        let mut request = self
            .client
            .post(format!("{}/{}", self.api_url, self.model_name))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed = serde_json::from_str::<InferenceResponse>(&text);
        if !status.is_success() {
            let detail = match parsed {
                Ok(InferenceResponse::Failure { error }) => error,
                _ => text,
            };
            return Err(ClassificationError::Inference(format!("{}: {}", status, detail)));
        }

        let predictions = match parsed {
            Ok(InferenceResponse::Nested(nested)) => nested.into_iter().flatten().collect(),
            Ok(InferenceResponse::Flat(flat)) => flat,
            Ok(InferenceResponse::Failure { error }) => {
                return Err(ClassificationError::Inference(error));
            }
            Err(e) => return Err(ClassificationError::Response(e.to_string())),
        };

        predictions
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| ClassificationError::Response("model returned no predictions".to_string()))
    }
}
