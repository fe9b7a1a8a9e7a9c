pub mod error;
pub mod logging;
pub mod stats;
pub mod storage;
pub mod text;
pub mod types;

pub use error::{Error, Result};
pub use storage::{AccountStore, ArticleStore};
pub use types::{
    normalize_email, Account, ArticleRecord, ClassificationResult, DashboardStats,
    ExtractionMetadata, ExtractionResult, InputType, Label, SourceCount,
};
