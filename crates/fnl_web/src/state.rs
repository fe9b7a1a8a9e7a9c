use std::sync::Arc;

use fnl_core::{AccountStore, ArticleStore};
use fnl_inference::ClassifierService;
use fnl_scrappers::{IngestManager, Scraper};
use fnl_storage::Stores;

use crate::auth::{PasswordHasher, SessionStore};

pub struct AppState {
    pub articles: Arc<dyn ArticleStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub ingest: IngestManager,
    pub sessions: SessionStore,
    pub hasher: PasswordHasher,
}

impl AppState {
    pub fn new(
        stores: Stores,
        classifier: Arc<ClassifierService>,
        scraper: Arc<dyn Scraper>,
        secret: &str,
    ) -> Self {
        Self {
            ingest: IngestManager::new(scraper, classifier, stores.articles.clone()),
            articles: stores.articles,
            accounts: stores.accounts,
            sessions: SessionStore::new(secret),
            hasher: PasswordHasher::default(),
        }
    }

    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }
}
