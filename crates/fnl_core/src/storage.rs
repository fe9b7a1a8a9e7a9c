use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::types::{Account, ArticleRecord};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a classified article
    async fn insert_article(&self, record: &ArticleRecord) -> Result<()>;

    /// Newest records of one user, by `created_at` descending
    async fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<ArticleRecord>>;

    /// Newest records across all users
    async fn recent(&self, limit: usize) -> Result<Vec<ArticleRecord>>;

    async fn count_for_user(&self, user_id: &str) -> Result<u64>;

    async fn count_all(&self) -> Result<u64>;

    /// Number of records per label for one user
    async fn label_counts(&self, user_id: &str) -> Result<BTreeMap<String, u64>>;

    /// URLs of the newest records labeled "Fake" that came from a URL
    async fn recent_fake_urls(&self, limit: usize) -> Result<Vec<String>>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up an account by email, case-insensitively
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>>;

    /// Insert a new account. Fails with `Error::Conflict` if the email exists.
    async fn insert_account(&self, account: &Account) -> Result<()>;
}
