//! Main-content extraction from raw article HTML.
//!
//! Extraction runs an ordered list of strategies and keeps the first one that
//! yields any paragraph after cleaning. Cleaning drops paragraphs shorter than
//! [`MIN_PARAGRAPH_CHARS`] and exact repeats of an earlier paragraph.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::io::Cursor;

use fnl_core::text::normalize;
use fnl_core::{ExtractionMetadata, ExtractionResult};
use readability::extractor::Product;
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub const MIN_PARAGRAPH_CHARS: usize = 40;

pub const NO_PARAGRAPHS: &str = "No readable paragraphs found; site may be script-heavy or blocked.";

const PLACEHOLDER_URL: &str = "http://localhost/";

/// A fetched page being extracted. The readability parse is shared by the
/// title lookup and the readability strategy, and runs at most once.
pub struct Page<'a> {
    html: &'a str,
    url: Url,
    readability: OnceCell<Option<Product>>,
}

impl<'a> Page<'a> {
    pub fn new(html: &'a str, source_url: &str) -> Self {
        Self {
            html,
            url: base_url(source_url),
            readability: OnceCell::new(),
        }
    }

    pub fn html(&self) -> &str {
        self.html
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn readability(&self) -> Option<&Product> {
        self.readability
            .get_or_init(|| {
                let mut cursor = Cursor::new(self.html.as_bytes());
                match readability::extractor::extract(&mut cursor, &self.url) {
                    Ok(product) => Some(product),
                    Err(e) => {
                        tracing::debug!("Readability extraction failed: {}", e);
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Title picked by the readability pass. Best effort.
    pub fn title(&self) -> Option<String> {
        let title = normalize(&self.readability()?.title);
        (!title.is_empty()).then_some(title)
    }
}

/// One extraction heuristic: a page in, cleaned paragraphs out.
pub type Strategy = fn(&Page) -> Vec<String>;

#[derive(Clone)]
pub struct HtmlExtractor {
    strategies: Vec<(&'static str, Strategy)>,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        let mut strategies: Vec<(&'static str, Strategy)> = vec![("readability", readability_paragraphs)];
        #[cfg(feature = "smoothie")]
        strategies.push(("smoothie", smoothie_paragraphs));
        strategies.push(("semantic", semantic_paragraphs));
        Self { strategies }
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategies(strategies: Vec<(&'static str, Strategy)>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }

    pub fn extract(&self, html: &str, source_url: &str) -> ExtractionResult {
        let page = Page::new(html, source_url);
        let mut metadata = ExtractionMetadata::for_url(source_url);
        metadata.title = page.title();

        for (name, strategy) in &self.strategies {
            let paragraphs = strategy(&page);
            if !paragraphs.is_empty() {
                tracing::debug!("Extracted {} paragraphs with {} from {}", paragraphs.len(), name, source_url);
                return ExtractionResult {
                    text: paragraphs.join("\n\n"),
                    metadata,
                };
            }
        }

        tracing::debug!("No strategy found readable paragraphs in {}", source_url);
        metadata.error = Some(NO_PARAGRAPHS.to_string());
        ExtractionResult::failed(metadata)
    }
}

/// Runs the default strategy cascade.
pub fn extract(html: &str, source_url: &str) -> ExtractionResult {
    HtmlExtractor::default().extract(html, source_url)
}

fn base_url(source_url: &str) -> Url {
    Url::parse(source_url)
        .or_else(|_| Url::parse(PLACEHOLDER_URL))
        .unwrap_or_else(|_| unreachable!("placeholder URL is valid"))
}

/// Drops short and repeated paragraphs, keeping first-seen order.
pub fn clean_paragraphs<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    for candidate in candidates {
        let text = normalize(candidate.as_ref());
        if text.chars().count() < MIN_PARAGRAPH_CHARS {
            continue;
        }
        if seen.insert(text.clone()) {
            cleaned.push(text);
        }
    }
    cleaned
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn select_texts(document: &Html, selector: &str) -> Vec<String> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).map(element_text).collect(),
        Err(e) => {
            tracing::warn!("Invalid selector {}: {:?}", selector, e);
            Vec::new()
        }
    }
}

/// Paragraphs of an already isolated content fragment.
fn content_paragraphs(content: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(content);
    clean_paragraphs(select_texts(&fragment, "p"))
}

/// Paragraphs of the main content region found by readability scoring.
fn readability_paragraphs(page: &Page) -> Vec<String> {
    match page.readability() {
        Some(product) => content_paragraphs(&product.content),
        None => Vec::new(),
    }
}

/// Paragraphs of the content dom_smoothie isolates. Its plain-text output runs
/// block elements together, so the paragraphs come from the cleaned markup and
/// the plain text is only split by line when that markup has no `<p>`.
#[cfg(feature = "smoothie")]
fn smoothie_paragraphs(page: &Page) -> Vec<String> {
    let config = dom_smoothie::Config {
        max_elements_to_parse: 9000,
        ..Default::default()
    };
    let article = dom_smoothie::Readability::new(page.html(), Some(page.url().as_str()), Some(config))
        .and_then(|mut readability| readability.parse());
    match article {
        Ok(article) => {
            let paragraphs = content_paragraphs(&article.content);
            if paragraphs.is_empty() {
                clean_paragraphs(article.text_content.lines())
            } else {
                paragraphs
            }
        }
        Err(e) => {
            tracing::debug!("Generalized extraction failed: {}", e);
            Vec::new()
        }
    }
}

/// Paragraphs inside article-like containers, else every paragraph.
fn semantic_paragraphs(page: &Page) -> Vec<String> {
    let document = Html::parse_document(page.html());
    let scoped = clean_paragraphs(select_texts(
        &document,
        r#"article p, main p, [itemprop="articleBody"] p"#,
    ));
    if !scoped.is_empty() {
        return scoped;
    }
    clean_paragraphs(select_texts(&document, "p"))
}
