//! Whitespace normalization and word-capping for classifier input.

/// Number of words kept in the snippet handed to the classifier.
pub const SNIPPET_WORDS: usize = 400;

/// Collapses every run of whitespace to one space and trims the ends.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps the first `max_words` whitespace-delimited tokens.
///
/// Text that is already short enough is returned as is.
pub fn truncate(text: &str, max_words: usize) -> String {
    if text.split_whitespace().nth(max_words).is_none() {
        return text.to_string();
    }
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The bounded snippet actually sent to a model.
pub fn snippet(text: &str) -> String {
    truncate(&normalize(text), SNIPPET_WORDS)
}
