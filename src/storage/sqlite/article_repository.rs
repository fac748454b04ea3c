use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};

use crate::domain::{ArticleCandidate, StoredArticle, UpsertOutcome};
use crate::errors::{FeedsmithError, FeedsmithResult};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::ArticleRepository;

pub struct SqliteArticleRepository {
    storage: SqliteStorage,
}

impl SqliteArticleRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

/// Stored as RFC 3339 in UTC so that text ordering matches time ordering.
fn encode_date(date: Option<DateTime<Utc>>) -> Option<String> {
    date.map(|d| d.to_rfc3339())
}

fn decode_date(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn row_to_article(row: &Row<'_>) -> rusqlite::Result<StoredArticle> {
    let published_at: Option<String> = row.get(9)?;
    let reading_time: i64 = row.get(12)?;
    let categories: String = row.get(13)?;

    Ok(StoredArticle {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        article: ArticleCandidate {
            guid: row.get(2)?,
            title: row.get(3)?,
            url: row.get(4)?,
            content: row.get(5)?,
            content_text: row.get(6)?,
            summary: row.get(7)?,
            author: row.get(8)?,
            published_at: decode_date(published_at),
            image_url: row.get(10)?,
            content_hash: row.get(11)?,
            reading_time: u32::try_from(reading_time).unwrap_or(0),
            categories: serde_json::from_str(&categories).unwrap_or_default(),
        },
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

impl ArticleRepository for SqliteArticleRepository {
    fn upsert(&self, subscription_id: i64, article: &ArticleCandidate) -> FeedsmithResult<UpsertOutcome> {
        let conn = self.storage.connection()?;

        let existing_hash: Option<String> = conn
            .query_row(
                "SELECT content_hash FROM articles WHERE subscription_id = ?1 AND guid = ?2",
                rusqlite::params![subscription_id, article.guid],
                |row| row.get(0),
            )
            .optional()?;

        if existing_hash.as_deref() == Some(article.content_hash.as_str()) {
            return Ok(UpsertOutcome::Unchanged);
        }

        let categories = serde_json::to_string(&article.categories)?;
        let published_at = encode_date(article.published_at);
        let reading_time = i64::from(article.reading_time);
        let params = rusqlite::params![
            subscription_id,
            article.guid,
            article.title,
            article.url,
            article.content,
            article.content_text,
            article.summary,
            article.author,
            published_at,
            article.image_url,
            article.content_hash,
            reading_time,
            categories,
        ];

        if existing_hash.is_some() {
            conn.execute(
                "UPDATE articles SET title = ?3, url = ?4, content = ?5, content_text = ?6, summary = ?7, \
                 author = ?8, published_at = ?9, image_url = ?10, content_hash = ?11, reading_time = ?12, \
                 categories = ?13, updated_at = datetime('now') \
                 WHERE subscription_id = ?1 AND guid = ?2",
                params,
            )?;
            Ok(UpsertOutcome::Updated)
        } else {
            conn.execute(
                "INSERT INTO articles (subscription_id, guid, title, url, content, content_text, summary, \
                 author, published_at, image_url, content_hash, reading_time, categories) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params,
            )?;
            Ok(UpsertOutcome::Inserted)
        }
    }

    fn list(&self, subscription_id: Option<i64>, limit: usize) -> FeedsmithResult<Vec<StoredArticle>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, subscription_id, guid, title, url, content, content_text, summary, author, \
             published_at, image_url, content_hash, reading_time, categories, created_at, updated_at \
             FROM articles \
             WHERE ?1 IS NULL OR subscription_id = ?1 \
             ORDER BY published_at IS NULL, published_at DESC, id DESC \
             LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let articles = stmt.query_map(rusqlite::params![subscription_id, limit], row_to_article)?;
        articles.collect::<Result<Vec<_>, _>>().map_err(FeedsmithError::from)
    }

    fn count(&self, subscription_id: i64) -> FeedsmithResult<usize> {
        let conn = self.storage.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM articles WHERE subscription_id = ?1",
            [subscription_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
