use std::time::Duration;

use async_trait::async_trait;
use fnl_core::{ExtractionMetadata, ExtractionResult, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;

use super::{utils, ScrapeError, Scraper};
use crate::extractor::HtmlExtractor;

pub const USER_AGENT: &str = "FakeNewsLab/1.0 (+https://example.com)";
pub const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

fn http_failure(metadata: ExtractionMetadata, error: reqwest::Error) -> ScrapeError {
    ScrapeError::Http {
        message: format!("HTTP error: {}", error),
        metadata,
    }
}

/// Fetches any URL and runs the extraction cascade over the body.
/// One attempt per call, no retries.
#[derive(Clone)]
pub struct GenericScraper {
    client: Client,
    extractor: HtmlExtractor,
}

impl GenericScraper {
    pub fn new() -> Result<Self> {
        Self::with_extractor(HtmlExtractor::default())
    }

    pub fn with_extractor(extractor: HtmlExtractor) -> Result<Self> {
        Self::with_timeout(extractor, FETCH_TIMEOUT)
    }

    /// `timeout` bounds the whole request, body included.
    pub fn with_timeout(extractor: HtmlExtractor, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, extractor })
    }

    /// Like [`Scraper::scrape`], with HTTP failures folded into the result.
    pub async fn fetch(&self, url: &str) -> ExtractionResult {
        match self.scrape(url).await {
            Ok(result) => result,
            Err(e) => e.into_result(),
        }
    }
}

#[async_trait]
impl Scraper for GenericScraper {
    fn source(&self) -> &str {
        "generic"
    }

    async fn scrape(&self, url: &str) -> std::result::Result<ExtractionResult, ScrapeError> {
        utils::check_url(url);
        let mut metadata = ExtractionMetadata::for_url(url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("🌐 Fetch of {} failed: {}", url, e);
                return Err(http_failure(metadata, e));
            }
        };
        metadata.status_code = Some(response.status().as_u16());

        let body = match response.error_for_status() {
            Ok(response) => response.text().await,
            Err(e) => Err(e),
        };
        let html = match body {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("🌐 Fetch of {} failed: {}", url, e);
                return Err(http_failure(metadata, e));
            }
        };

        // Extraction is CPU-bound and scraper's DOM is not Send.
        let extractor = self.extractor.clone();
        let source_url = url.to_string();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&html, &source_url))
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Extraction task failed: {}", e);
                ExtractionResult::failed(ExtractionMetadata {
                    error: Some(format!("Extraction failed: {}", e)),
                    ..Default::default()
                })
            });

        metadata.title = extracted.metadata.title;
        if extracted.text.is_empty() {
            metadata.error = extracted.metadata.error;
            tracing::warn!("📄 No readable text in {}", url);
        }
        Ok(ExtractionResult {
            text: extracted.text,
            metadata,
        })
    }
}
