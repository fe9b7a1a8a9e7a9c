use std::sync::Arc;

use chrono::Utc;
use fnl_core::{ArticleRecord, ArticleStore, ExtractionMetadata, ExtractionResult, InputType};
use fnl_inference::ClassifierService;
use thiserror::Error;
use uuid::Uuid;

use crate::scrapers::{ScrapeError, Scraper};

pub const MISSING_URL: &str = "Provide a URL to analyze.";

pub const NO_TEXT_FALLBACK: &str =
    "No text found. The site may block scraping; try another link or paste the text manually.";

/// Why a submission produced no record. Every variant except `Storage` is an
/// expected outcome the caller reports back to the user.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Fetch {
        message: String,
        metadata: ExtractionMetadata,
    },

    #[error("{message}")]
    Extraction {
        message: String,
        metadata: ExtractionMetadata,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Storage error: {0}")]
    Storage(#[from] fnl_core::Error),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "validation",
            IngestError::Fetch { .. } => "fetch",
            IngestError::Extraction { .. } => "extraction",
            IngestError::Model(_) => "model",
            IngestError::Storage(_) => "storage",
        }
    }

    pub fn metadata(&self) -> Option<&ExtractionMetadata> {
        match self {
            IngestError::Fetch { metadata, .. } | IngestError::Extraction { metadata, .. } => Some(metadata),
            _ => None,
        }
    }
}

impl From<IngestError> for fnl_core::Error {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Storage(e) => e,
            IngestError::Model(m) => fnl_core::Error::Inference(m),
            other => fnl_core::Error::Scraping(other.to_string()),
        }
    }
}

/// Parses the submitted input type. Missing means pasted text.
pub fn parse_input_type(raw: Option<&str>) -> Result<InputType, IngestError> {
    raw.unwrap_or_default()
        .parse()
        .map_err(|_| IngestError::Validation(format!("Unsupported input type: {}", raw.unwrap_or_default().trim())))
}

fn trimmed(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or_default()
}

/// Turns a submission into a classified, persisted [`ArticleRecord`].
pub struct IngestManager {
    scraper: Arc<dyn Scraper>,
    classifier: Arc<ClassifierService>,
    storage: Arc<dyn ArticleStore>,
}

impl IngestManager {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        classifier: Arc<ClassifierService>,
        storage: Arc<dyn ArticleStore>,
    ) -> Self {
        Self {
            scraper,
            classifier,
            storage,
        }
    }

    pub fn classifier(&self) -> &Arc<ClassifierService> {
        &self.classifier
    }

    /// Fetches and extracts `url` without classifying or storing anything.
    pub async fn extract(&self, url: &str) -> ExtractionResult {
        match self.scraper.scrape(url.trim()).await {
            Ok(result) => result,
            Err(e) => e.into_result(),
        }
    }

    pub async fn ingest(
        &self,
        user_id: &str,
        input_type: InputType,
        raw_text: Option<&str>,
        url: Option<&str>,
    ) -> Result<ArticleRecord, IngestError> {
        let (raw_input, extraction) = match input_type {
            InputType::Url => {
                let url = trimmed(url);
                if url.is_empty() {
                    return Err(IngestError::Validation(MISSING_URL.to_string()));
                }
                let extraction = self.scraper.scrape(url).await.map_err(|e| match e {
                    ScrapeError::Http { message, metadata } => IngestError::Fetch { message, metadata },
                })?;
                (url.to_string(), extraction)
            }
            InputType::Text => {
                let text = trimmed(raw_text);
                let extraction = ExtractionResult {
                    text: text.to_string(),
                    metadata: ExtractionMetadata::pasted(),
                };
                (text.to_string(), extraction)
            }
        };

        if extraction.is_empty() {
            return Err(match input_type {
                InputType::Url => IngestError::Extraction {
                    message: extraction
                        .metadata
                        .error
                        .clone()
                        .unwrap_or_else(|| NO_TEXT_FALLBACK.to_string()),
                    metadata: extraction.metadata,
                },
                InputType::Text => IngestError::Validation(NO_TEXT_FALLBACK.to_string()),
            });
        }

        let result = self.classifier.classify(&extraction.text).await;
        if result.is_error() {
            let message = result.error.unwrap_or_else(|| "Unknown issue".to_string());
            tracing::warn!("🧠 Classification failed for {}: {}", user_id, message);
            return Err(IngestError::Model(message));
        }

        let record = ArticleRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            input_type,
            raw_input,
            article_text: extraction.text,
            model_label: result.label,
            model_score: result.score,
            created_at: Utc::now(),
            meta: extraction.metadata,
        };
        self.storage.insert_article(&record).await?;
        tracing::info!(
            "✨ Stored {} ({} {:.4}) for {}",
            record.id,
            record.model_label,
            record.model_score,
            user_id
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::GenericScraper;
    use async_trait::async_trait;
    use fnl_core::Label;
    use fnl_inference::models::DummyModel;
    use fnl_storage::backends::MemoryStorage;

    struct StubScraper(Result<ExtractionResult, ScrapeError>);

    #[async_trait]
    impl Scraper for StubScraper {
        fn source(&self) -> &str {
            "stub"
        }

        async fn scrape(&self, _url: &str) -> Result<ExtractionResult, ScrapeError> {
            self.0.clone()
        }
    }

    fn manager_with(
        scraper: Arc<dyn Scraper>,
        model: Arc<DummyModel>,
    ) -> (IngestManager, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let classifier = Arc::new(ClassifierService::with_backend(model));
        (IngestManager::new(scraper, classifier, storage.clone()), storage)
    }

    fn extracted(text: &str) -> Arc<dyn Scraper> {
        let mut metadata = ExtractionMetadata::for_url("https://news.example.com/a");
        metadata.status_code = Some(200);
        Arc::new(StubScraper(Ok(ExtractionResult {
            text: text.to_string(),
            metadata,
        })))
    }

    #[test]
    fn test_parse_input_type() {
        assert_eq!(parse_input_type(None).unwrap(), InputType::Text);
        assert_eq!(parse_input_type(Some("URL")).unwrap(), InputType::Url);
        assert!(matches!(parse_input_type(Some("pdf")), Err(IngestError::Validation(_))));
    }

    #[tokio::test]
    async fn test_text_submission_is_stored() {
        let model = Arc::new(DummyModel::fixed("REAL", 0.87));
        let (manager, storage) = manager_with(extracted("unused"), model.clone());

        let record = manager
            .ingest("user-1", InputType::Text, Some("This is breaking news about the economy."), None)
            .await
            .unwrap();
        assert_eq!(record.model_label, Label::Real);
        assert_eq!(record.model_score, 0.87);
        assert_eq!(record.input_type, InputType::Text);
        assert_eq!(record.raw_input, "This is breaking news about the economy.");
        assert!(record.meta.url.is_none());

        let history = storage.recent_for_user("user-1", 50).await.unwrap();
        assert_eq!(history, vec![record]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_url_submission_is_stored() {
        let model = Arc::new(DummyModel::fixed("LABEL_1", 0.93));
        let (manager, storage) = manager_with(extracted("Paragraph one of the story.\n\nParagraph two."), model);

        let record = manager
            .ingest("user-1", InputType::Url, None, Some("  https://news.example.com/a  "))
            .await
            .unwrap();
        assert_eq!(record.model_label, Label::Fake);
        assert_eq!(record.raw_input, "https://news.example.com/a");
        assert_eq!(record.meta.status_code, Some(200));
        assert_eq!(storage.recent_fake_urls(10).await.unwrap(), vec!["https://news.example.com/a"]);
    }

    #[tokio::test]
    async fn test_missing_url_is_validation_error() {
        let model = Arc::new(DummyModel::new());
        let (manager, storage) = manager_with(extracted("text"), model.clone());

        for url in [None, Some(""), Some("   ")] {
            let err = manager.ingest("user-1", InputType::Url, Some("pasted"), url).await.unwrap_err();
            assert!(matches!(&err, IngestError::Validation(m) if m == MISSING_URL));
        }
        assert_eq!(storage.count_all().await.unwrap(), 0);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_is_validation_error() {
        let model = Arc::new(DummyModel::new());
        let (manager, _) = manager_with(extracted("text"), model.clone());

        let err = manager.ingest("user-1", InputType::Text, Some(" \n "), None).await.unwrap_err();
        assert_eq!(err.to_string(), NO_TEXT_FALLBACK);
        assert_eq!(err.kind(), "validation");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_extraction_uses_extractor_error() {
        let mut metadata = ExtractionMetadata::for_url("https://spa.example.com/");
        metadata.error = Some("No readable paragraphs found; site may be script-heavy or blocked.".to_string());
        let scraper = Arc::new(StubScraper(Ok(ExtractionResult::failed(metadata))));
        let (manager, storage) = manager_with(scraper, Arc::new(DummyModel::new()));

        let err = manager
            .ingest("user-1", InputType::Url, None, Some("https://spa.example.com/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "extraction");
        assert!(err.to_string().starts_with("No readable paragraphs"));
        assert_eq!(err.metadata().unwrap().url.as_deref(), Some("https://spa.example.com/"));
        assert_eq!(storage.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_extraction_without_reason_uses_fallback() {
        let scraper = Arc::new(StubScraper(Ok(ExtractionResult::failed(ExtractionMetadata::for_url(
            "https://news.example.com/a",
        )))));
        let (manager, _) = manager_with(scraper, Arc::new(DummyModel::new()));

        let err = manager
            .ingest("user-1", InputType::Url, None, Some("https://news.example.com/a"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), NO_TEXT_FALLBACK);
    }

    #[tokio::test]
    async fn test_unreachable_url_is_fetch_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let model = Arc::new(DummyModel::new());
        let (manager, storage) = manager_with(Arc::new(GenericScraper::new().unwrap()), model.clone());

        let err = manager
            .ingest("user-1", InputType::Url, None, Some(&format!("http://{}/story", addr)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "fetch");
        assert!(err.to_string().contains("HTTP error"));
        assert_eq!(storage.count_all().await.unwrap(), 0);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_is_not_stored() {
        let (manager, storage) = manager_with(extracted("text"), Arc::new(DummyModel::failing("weights missing")));

        let err = manager
            .ingest("user-1", InputType::Text, Some("Some article text"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "model");
        assert!(err.to_string().starts_with("Model error: "));
        assert!(err.to_string().contains("weights missing"));
        assert_eq!(storage.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_extract_folds_fetch_failure() {
        let mut metadata = ExtractionMetadata::for_url("https://news.example.com/a");
        metadata.status_code = Some(503);
        let scraper = Arc::new(StubScraper(Err(ScrapeError::Http {
            message: "HTTP error: 503 Service Unavailable".to_string(),
            metadata,
        })));
        let (manager, _) = manager_with(scraper, Arc::new(DummyModel::new()));

        let result = manager.extract("https://news.example.com/a").await;
        assert!(result.text.is_empty());
        assert_eq!(result.metadata.status_code, Some(503));
        assert!(result.metadata.error.unwrap().contains("HTTP error"));
    }
}
