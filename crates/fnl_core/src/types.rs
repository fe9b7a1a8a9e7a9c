use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Metadata gathered while turning a URL (or pasted text) into article text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionMetadata {
    pub fn for_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    /// Metadata for pasted text: no URL, nothing fetched.
    pub fn pasted() -> Self {
        Self::default()
    }
}

/// Extracted article text. An empty `text` comes with `metadata.error` set
/// whenever the extractor knows why nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    pub fn failed(metadata: ExtractionMetadata) -> Self {
        Self {
            text: String::new(),
            metadata,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Credibility label. Raw model labels outside the known vocabulary are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Label {
    Real,
    Fake,
    Unknown,
    Error,
    Other(String),
}

impl Label {
    /// Maps a raw classifier label onto the application vocabulary.
    pub fn from_model(raw: &str) -> Self {
        match raw {
            "FAKE" | "LABEL_1" => Label::Fake,
            "REAL" | "LABEL_0" => Label::Real,
            other => Label::from(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::Real => "Real",
            Label::Fake => "Fake",
            Label::Unknown => "Unknown",
            Label::Error => "Error",
            Label::Other(s) => s,
        }
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Real" => Label::Real,
            "Fake" => Label::Fake,
            "Unknown" => Label::Unknown,
            "Error" => Label::Error,
            _ => Label::Other(value),
        }
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationResult {
    pub fn unknown() -> Self {
        Self {
            label: Label::Unknown,
            score: 0.0,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            label: Label::Error,
            score: 0.0,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.label == Label::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Url,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Url => "url",
        }
    }
}

impl FromStr for InputType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(InputType::Text),
            "url" => Ok(InputType::Url),
            other => Err(Error::Scraping(format!("Unsupported input type: {}", other))),
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified submission. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub user_id: String,
    pub input_type: InputType,
    pub raw_input: String,
    pub article_text: String,
    pub model_label: Label,
    pub model_score: f64,
    pub created_at: DateTime<Utc>,
    pub meta: ExtractionMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Lower-cases and trims an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub count_user: u64,
    pub count_all: u64,
    pub last_record: Option<ArticleRecord>,
    pub label_counts: BTreeMap<String, u64>,
    pub fake_share: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub domain: String,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_vocabulary() {
        assert_eq!(Label::from_model("FAKE"), Label::Fake);
        assert_eq!(Label::from_model("REAL"), Label::Real);
        assert_eq!(Label::from_model("LABEL_0"), Label::Real);
        assert_eq!(Label::from_model("LABEL_1"), Label::Fake);
        assert_eq!(Label::from_model("SATIRE"), Label::Other("SATIRE".to_string()));
    }

    #[test]
    fn test_label_serializes_as_string() {
        let json = serde_json::to_string(&Label::Fake).unwrap();
        assert_eq!(json, "\"Fake\"");
        let label: Label = serde_json::from_str("\"mixed\"").unwrap();
        assert_eq!(label, Label::Other("mixed".to_string()));
    }

    #[test]
    fn test_pasted_metadata_keeps_null_url() {
        let json = serde_json::to_value(ExtractionMetadata::pasted()).unwrap();
        assert_eq!(json, serde_json::json!({ "url": null }));
    }

    #[test]
    fn test_input_type_parsing() {
        assert_eq!("url".parse::<InputType>().unwrap(), InputType::Url);
        assert_eq!("TEXT".parse::<InputType>().unwrap(), InputType::Text);
        assert_eq!("".parse::<InputType>().unwrap(), InputType::Text);
        assert!("pdf".parse::<InputType>().is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
