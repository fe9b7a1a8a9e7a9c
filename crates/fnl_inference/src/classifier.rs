//! Lazily loaded text classifier shared by every request.
//!
//! [`ClassifierService`] is built once at start-up and handed around behind an
//! `Arc`. The backend model is constructed on first use; concurrent first
//! callers wait on a single load. A failed load is not cached, so the next
//! call tries again.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use fnl_core::text;
use fnl_core::{ClassificationResult, Label};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::OnceCell;

use crate::models::{create_model, ClassifierBackend};
use crate::{ClassificationError, Config};

/// Hard ceiling on input positions for the BERT model family.
pub const MAX_POSITIONS: usize = 512;

type LoadResult = Result<Arc<dyn ClassifierBackend>, ClassificationError>;
type Loader = Box<dyn Fn() -> BoxFuture<'static, LoadResult> + Send + Sync>;

pub struct ClassifierService {
    loader: Loader,
    model: OnceCell<Arc<dyn ClassifierBackend>>,
}

impl fmt::Debug for ClassifierService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierService")
            .field("model", &self.model.get())
            .finish()
    }
}

/// The model's own limit, capped at [`MAX_POSITIONS`].
pub fn effective_max_length(model_max_length: Option<usize>) -> usize {
    model_max_length
        .filter(|n| *n > 0)
        .unwrap_or(MAX_POSITIONS)
        .min(MAX_POSITIONS)
}

fn round_score(score: f64) -> f64 {
    ((score * 10_000.0).round() / 10_000.0).clamp(0.0, 1.0)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "classifier panicked".to_string()
    }
}

impl ClassifierService {
    /// Loads the backend described by `config` on first use.
    pub fn new(config: Config) -> Self {
        Self::from_loader(move || {
            let config = config.clone();
            async move { create_model(&config).await }
        })
    }

    pub fn from_loader<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult> + Send + 'static,
    {
        Self {
            loader: Box::new(move || loader().boxed()),
            model: OnceCell::new(),
        }
    }

    /// Wraps an already constructed backend.
    pub fn with_backend(backend: Arc<dyn ClassifierBackend>) -> Self {
        Self {
            loader: Box::new(|| {
                async { Err(ClassificationError::Load("backend already provided".to_string())) }.boxed()
            }),
            model: OnceCell::new_with(Some(backend)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// The shared backend, loading it if this is the first call.
    pub async fn model(&self) -> Result<Arc<dyn ClassifierBackend>, ClassificationError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                tracing::info!("🧠 Loading classification model");
                (self.loader)().await
            })
            .await?;
        Ok(model.clone())
    }

    pub async fn try_classify(&self, text: &str) -> Result<ClassificationResult, ClassificationError> {
        let cleaned = text::normalize(text);
        if cleaned.is_empty() {
            return Ok(ClassificationResult::unknown());
        }
        let snippet = text::truncate(&cleaned, text::SNIPPET_WORDS);

        let model = self.model().await?;
        let max_length = effective_max_length(model.model_max_length());
        tracing::debug!(
            "Classifying {} words with {} (max length {})",
            snippet.split_whitespace().count(),
            model.name(),
            max_length
        );

        let prediction = model.predict(&snippet, max_length).await?;
        Ok(ClassificationResult {
            label: Label::from_model(&prediction.label),
            score: round_score(prediction.score),
            error: None,
        })
    }

    /// Classifies `text`. Failures, including backend panics, come back as
    /// the `Error` label instead of propagating.
    pub async fn classify(&self, text: &str) -> ClassificationResult {
        match AssertUnwindSafe(self.try_classify(text)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!("Classification failed: {}", e);
                ClassificationResult::error(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload);
                tracing::error!("Classifier panicked: {}", message);
                ClassificationResult::error(message)
            }
        }
    }
}
