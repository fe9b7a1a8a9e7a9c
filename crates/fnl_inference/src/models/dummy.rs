use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ClassifierBackend, Prediction};
use crate::ClassificationError;

const SENSATIONAL: &[&str] = &[
    "shocking",
    "you won't believe",
    "miracle",
    "secret",
    "hoax",
    "exposed",
    "they don't want you to know",
    "!!!",
];

const SOURCED: &[&str] = &[
    "according to",
    "said",
    "reported",
    "officials",
    "study",
    "percent",
];

#[derive(Debug, Clone)]
enum Behavior {
    Keywords,
    Fixed(Prediction),
    Failing(String),
}

/// Offline classifier. Scores text with a keyword heuristic, or answers with
/// a fixed prediction or a fixed failure.
///
/// Every call is recorded so callers can see what reached the model.
pub struct DummyModel {
    behavior: Behavior,
    max_length: Option<usize>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, usize)>>,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel")
            .field("behavior", &self.behavior)
            .field("max_length", &self.max_length)
            .finish()
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self::with_behavior(Behavior::Keywords)
    }

    /// Always answers `label` with `score`.
    pub fn fixed(label: &str, score: f64) -> Self {
        Self::with_behavior(Behavior::Fixed(Prediction {
            label: label.to_string(),
            score,
        }))
    }

    /// Always fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Failing(message.to_string()))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            max_length: Some(512),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Reports `max_length` as the model's configured input limit.
    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snippet and max length of the latest call.
    pub fn last_request(&self) -> Option<(String, usize)> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }

    fn keyword_prediction(snippet: &str) -> Prediction {
        let lower = snippet.to_lowercase();
        let sensational = SENSATIONAL.iter().filter(|k| lower.contains(*k)).count() as f64;
        let sourced = SOURCED.iter().filter(|k| lower.contains(*k)).count() as f64;
        let lean = sensational - sourced;
        let score = (0.5 + lean.abs() * 0.1).min(0.99);
        let label = if lean > 0.0 { "FAKE" } else { "REAL" };
        Prediction {
            label: label.to_string(),
            score,
        }
    }
}

#[async_trait::async_trait]
impl ClassifierBackend for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn model_max_length(&self) -> Option<usize> {
        self.max_length
    }

    async fn predict(&self, snippet: &str, max_length: usize) -> Result<Prediction, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((snippet.to_string(), max_length));
        }

        match &self.behavior {
            Behavior::Keywords => Ok(Self::keyword_prediction(snippet)),
            Behavior::Fixed(prediction) => Ok(prediction.clone()),
            Behavior::Failing(message) => Err(ClassificationError::Inference(message.clone())),
        }
    }
}
