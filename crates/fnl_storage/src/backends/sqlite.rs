use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use fnl_core::{
    normalize_email, Account, AccountStore, ArticleRecord, ArticleStore, ExtractionMetadata,
    InputType, Label, Result,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        input_type TEXT NOT NULL,
        raw_input TEXT NOT NULL,
        article_text TEXT NOT NULL,
        model_label TEXT NOT NULL,
        model_score REAL NOT NULL,
        created_at TEXT NOT NULL,
        meta TEXT NOT NULL,
        meta_url TEXT
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_articles_user_created
    ON articles (user_id, created_at DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_email ON accounts (email)
    "#,
];

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

fn db_err(context: &str, e: sqlx::Error) -> fnl_core::Error {
    fnl_core::Error::Database(format!("{}: {}", context, e))
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| fnl_core::Error::Database(format!("Failed to parse date: {}", e)))
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| db_err("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| db_err(&format!("Failed to run migration {}", i), e))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    fn article_from_row(row: &SqliteRow) -> Result<ArticleRecord> {
        let input_type: String = row.get("input_type");
        let meta: String = row.get("meta");
        let created_at: String = row.get("created_at");
        Ok(ArticleRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            input_type: input_type.parse::<InputType>()?,
            raw_input: row.get("raw_input"),
            article_text: row.get("article_text"),
            model_label: Label::from(row.get::<String, _>("model_label")),
            model_score: row.get("model_score"),
            created_at: decode_time(&created_at)?,
            meta: serde_json::from_str::<ExtractionMetadata>(&meta)?,
        })
    }

    fn account_from_row(row: &SqliteRow) -> Result<Account> {
        let created_at: String = row.get("created_at");
        Ok(Account {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: decode_time(&created_at)?,
        })
    }

    async fn fetch_articles(&self, sql: &str, bind: Option<&str>, limit: usize) -> Result<Vec<ArticleRecord>> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to query articles", e))?;
        rows.iter().map(Self::article_from_row).collect()
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn insert_article(&self, record: &ArticleRecord) -> Result<()> {
        let meta = serde_json::to_string(&record.meta)?;

        sqlx::query(
            r#"
            INSERT INTO articles
            (id, user_id, input_type, raw_input, article_text, model_label, model_score, created_at, meta, meta_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.input_type.as_str())
        .bind(&record.raw_input)
        .bind(&record.article_text)
        .bind(record.model_label.as_str())
        .bind(record.model_score)
        .bind(encode_time(&record.created_at))
        .bind(meta)
        .bind(record.meta.url.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to store article", e))?;

        Ok(())
    }

    async fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<ArticleRecord>> {
        self.fetch_articles(
            r#"
            SELECT * FROM articles
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
            Some(user_id),
            limit,
        )
        .await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ArticleRecord>> {
        self.fetch_articles(
            r#"
            SELECT * FROM articles
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
            None,
            limit,
        )
        .await
    }

    async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("Failed to count articles", e))?;
        Ok(count as u64)
    }

    async fn count_all(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("Failed to count articles", e))?;
        Ok(count as u64)
    }

    async fn label_counts(&self, user_id: &str) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query(
            r#"
            SELECT model_label, COUNT(*) AS count FROM articles
            WHERE user_id = ?
            GROUP BY model_label
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to aggregate labels", e))?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>("model_label"), row.get::<i64, _>("count") as u64))
            .collect())
    }

    async fn recent_fake_urls(&self, limit: usize) -> Result<Vec<String>> {
        let urls: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT meta_url FROM articles
            WHERE model_label = ? AND meta_url IS NOT NULL
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(Label::Fake.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to query fake sources", e))?;
        Ok(urls)
    }
}

#[async_trait]
impl AccountStore for SQLiteStorage {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to look up account", e))?;
        row.as_ref().map(Self::account_from_row).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to look up account", e))?;
        row.as_ref().map(Self::account_from_row).transpose()
    }

    async fn insert_account(&self, account: &Account) -> Result<()> {
        let email = normalize_email(&account.email);
        let result = sqlx::query(
            "INSERT INTO accounts (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(&email)
        .bind(&account.password_hash)
        .bind(encode_time(&account.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                fnl_core::Error::Conflict(format!("Email already registered: {}", email)),
            ),
            Err(e) => Err(db_err("Failed to store account", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn record(id: &str, user: &str, label: Label, url: Option<&str>, age_secs: i64) -> ArticleRecord {
        ArticleRecord {
            id: id.to_string(),
            user_id: user.to_string(),
            input_type: if url.is_some() { InputType::Url } else { InputType::Text },
            raw_input: url.unwrap_or("pasted text").to_string(),
            article_text: "Test content long enough to be an article.".to_string(),
            model_label: label,
            model_score: 0.8731,
            created_at: Utc::now() - Duration::seconds(age_secs),
            meta: ExtractionMetadata {
                url: url.map(str::to_string),
                status_code: url.map(|_| 200),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_sqlite_articles() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();
        assert!(storage.get_db_path().exists());

        storage
            .insert_article(&record("1", "u1", Label::Fake, Some("https://a.example/1"), 30))
            .await
            .unwrap();
        storage.insert_article(&record("2", "u1", Label::Real, None, 20)).await.unwrap();
        storage.insert_article(&record("3", "u1", Label::Fake, None, 10)).await.unwrap();
        storage
            .insert_article(&record("4", "u2", Label::Fake, Some("https://b.example/1"), 0))
            .await
            .unwrap();

        let history = storage.recent_for_user("u1", 50).await.unwrap();
        let ids: Vec<_> = history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
        assert_eq!(history[2].meta.status_code, Some(200));
        assert_eq!(history[1].meta.url, None);
        assert_eq!(history[0].model_score, 0.8731);

        assert_eq!(storage.count_for_user("u1").await.unwrap(), 3);
        assert_eq!(storage.count_all().await.unwrap(), 4);
        assert_eq!(storage.recent(1).await.unwrap()[0].id, "4");

        let counts = storage.label_counts("u1").await.unwrap();
        assert_eq!(counts.get("Fake"), Some(&2));
        assert_eq!(counts.get("Real"), Some(&1));

        let urls = storage.recent_fake_urls(200).await.unwrap();
        assert_eq!(urls, vec!["https://b.example/1", "https://a.example/1"]);
    }

    #[tokio::test]
    async fn test_sqlite_accounts() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("accounts.db"))
            .await
            .unwrap();

        let account = Account {
            id: "acc-1".to_string(),
            email: "Reader@Example.com".to_string(),
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        };
        storage.insert_account(&account).await.unwrap();

        let found = storage.find_by_email("READER@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, "acc-1");
        assert_eq!(found.email, "reader@example.com");
        assert!(storage.find_by_id("acc-1").await.unwrap().is_some());
        assert!(storage.find_by_id("missing").await.unwrap().is_none());

        let duplicate = Account {
            id: "acc-2".to_string(),
            ..account
        };
        let err = storage.insert_account(&duplicate).await.unwrap_err();
        assert!(matches!(err, fnl_core::Error::Conflict(_)));
    }
}
