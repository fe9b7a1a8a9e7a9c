pub mod cli;
pub mod extractor;
pub mod manager;
pub mod scrapers;

pub use cli::{handle_command, ScraperCommands};
pub use extractor::{extract, HtmlExtractor, Page, MIN_PARAGRAPH_CHARS};
pub use manager::{parse_input_type, IngestError, IngestManager};
pub use scrapers::{GenericScraper, ScrapeError, Scraper};

pub mod prelude {
    pub use super::manager::{IngestError, IngestManager};
    pub use super::scrapers::{GenericScraper, Scraper};
    pub use fnl_core::{Error, ExtractionResult, Result};
}
