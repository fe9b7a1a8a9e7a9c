use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use fnl_core::{normalize_email, Account, AccountStore, ArticleRecord, ArticleStore, Label, Result};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryStore {
    articles: Vec<ArticleRecord>,
    accounts: HashMap<String, Account>,
}

impl MemoryStore {
    /// Newest first; equal timestamps keep the later insert first.
    fn newest_first<'a>(&'a self, filter: impl Fn(&ArticleRecord) -> bool) -> Vec<&'a ArticleRecord> {
        let mut records: Vec<&ArticleRecord> = self.articles.iter().rev().filter(|r| filter(*r)).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}

/// Process-local storage for development and tests.
#[derive(Default)]
pub struct MemoryStorage {
    store: RwLock<MemoryStore>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn insert_article(&self, record: &ArticleRecord) -> Result<()> {
        let mut store = self.store.write().await;
        store.articles.push(record.clone());
        Ok(())
    }

    async fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<ArticleRecord>> {
        let store = self.store.read().await;
        Ok(store
            .newest_first(|r| r.user_id == user_id)
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ArticleRecord>> {
        let store = self.store.read().await;
        Ok(store.newest_first(|_| true).into_iter().take(limit).cloned().collect())
    }

    async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        let store = self.store.read().await;
        Ok(store.articles.iter().filter(|r| r.user_id == user_id).count() as u64)
    }

    async fn count_all(&self) -> Result<u64> {
        let store = self.store.read().await;
        Ok(store.articles.len() as u64)
    }

    async fn label_counts(&self, user_id: &str) -> Result<BTreeMap<String, u64>> {
        let store = self.store.read().await;
        let mut counts = BTreeMap::new();
        for record in store.articles.iter().filter(|r| r.user_id == user_id) {
            *counts.entry(record.model_label.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn recent_fake_urls(&self, limit: usize) -> Result<Vec<String>> {
        let store = self.store.read().await;
        Ok(store
            .newest_first(|r| r.model_label == Label::Fake && r.meta.url.is_some())
            .into_iter()
            .filter_map(|r| r.meta.url.clone())
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl AccountStore for MemoryStorage {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let store = self.store.read().await;
        Ok(store.accounts.get(&normalize_email(email)).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let store = self.store.read().await;
        Ok(store.accounts.values().find(|a| a.id == id).cloned())
    }

    async fn insert_account(&self, account: &Account) -> Result<()> {
        let mut store = self.store.write().await;
        let email = normalize_email(&account.email);
        if store.accounts.contains_key(&email) {
            return Err(fnl_core::Error::Conflict(format!("Email already registered: {}", email)));
        }
        let mut account = account.clone();
        account.email = email.clone();
        store.accounts.insert(email, account);
        Ok(())
    }
}
