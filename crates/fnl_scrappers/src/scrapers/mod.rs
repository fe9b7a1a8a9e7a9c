use async_trait::async_trait;
use fnl_core::{ExtractionMetadata, ExtractionResult};
use thiserror::Error;

pub mod generic;

pub use generic::GenericScraper;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScrapeError {
    /// Network, timeout or non-2xx failure. `metadata` keeps whatever was
    /// learned before the failure, such as the response status.
    #[error("{message}")]
    Http {
        message: String,
        metadata: ExtractionMetadata,
    },
}

impl ScrapeError {
    pub fn metadata(&self) -> &ExtractionMetadata {
        match self {
            ScrapeError::Http { metadata, .. } => metadata,
        }
    }

    /// Folds the failure into an empty extraction carrying the message.
    pub fn into_result(self) -> ExtractionResult {
        match self {
            ScrapeError::Http { message, mut metadata } => {
                metadata.error = Some(message);
                ExtractionResult::failed(metadata)
            }
        }
    }
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Returns the name of the scraper
    fn source(&self) -> &str;

    /// Fetches `url` and extracts its article text. An empty text with
    /// `metadata.error` set means the page arrived but nothing was readable.
    async fn scrape(&self, url: &str) -> Result<ExtractionResult, ScrapeError>;
}

/// Common utilities for scrapers
pub(crate) mod utils {
    use fnl_core::{Error, Result};
    use url::Url;

    pub fn parse_url(url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))
    }

    /// Extraction keeps running on unparsable URLs, so callers only log this.
    pub fn check_url(url: &str) {
        if let Err(e) = parse_url(url) {
            tracing::debug!("{}", e);
        }
    }
}
