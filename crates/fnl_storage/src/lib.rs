use std::path::PathBuf;
use std::sync::Arc;

use fnl_core::{AccountStore, ArticleStore, Result};

pub mod backends;

pub use backends::*;

/// Where records and accounts live, as given by `DATABASE_URL`.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageKind {
    Memory,
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    pub database_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "memory".to_string(),
            database_name: "fake_news_lab".to_string(),
        }
    }
}

impl StorageConfig {
    /// `memory`, `sqlite` (file named after the database) or `sqlite:<path>`.
    pub fn kind(&self) -> Result<StorageKind> {
        let url = self.database_url.trim();
        if url.is_empty() || url == "memory" || url == "memory://" {
            return Ok(StorageKind::Memory);
        }
        if url == "sqlite" || url == "sqlite://" {
            return Ok(StorageKind::Sqlite(PathBuf::from(format!("{}.db", self.database_name))));
        }
        if let Some(path) = url.strip_prefix("sqlite:") {
            let path = path.trim_start_matches("//");
            if path.is_empty() {
                return Err(fnl_core::Error::Storage("sqlite URL is missing a path".to_string()));
            }
            return Ok(StorageKind::Sqlite(PathBuf::from(path)));
        }
        Err(fnl_core::Error::Storage(format!("Unsupported database URL: {}", url)))
    }
}

/// Handles to the two stores. Both may point at the same backend.
#[derive(Clone)]
pub struct Stores {
    pub articles: Arc<dyn ArticleStore>,
    pub accounts: Arc<dyn AccountStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        Self {
            articles: storage.clone(),
            accounts: storage,
        }
    }
}

pub async fn create_storage(config: &StorageConfig) -> Result<Stores> {
    match config.kind()? {
        StorageKind::Memory => {
            tracing::info!("💾 Using in-memory storage");
            Ok(Stores::memory())
        }
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite(path) => {
            let storage = Arc::new(SQLiteStorage::new_with_path(&path).await?);
            tracing::info!("💾 Using SQLite storage at {}", path.display());
            Ok(Stores {
                articles: storage.clone(),
                accounts: storage,
            })
        }
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite(_) => Err(fnl_core::Error::Storage(
            "This build has no SQLite support; enable the `sqlite` feature".to_string(),
        )),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageConfig, StorageKind, Stores};
}
