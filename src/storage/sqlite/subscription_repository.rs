use rusqlite::Row;

use crate::domain::{FeedDocument, Subscription};
use crate::errors::{FeedsmithError, FeedsmithResult};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::SubscriptionRepository;

const COLUMNS: &str = "id, feed_url, title, description, site_url, image_url, language, dialect, \
     etag, last_modified, last_fetched_at, last_error_code, last_error_message, error_count, created_at";

pub struct SqliteSubscriptionRepository {
    storage: SqliteStorage,
}

impl SqliteSubscriptionRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let dialect: Option<String> = row.get(7)?;
    let error_count: i64 = row.get(13)?;

    Ok(Subscription {
        id: Some(row.get(0)?),
        feed_url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        site_url: row.get(4)?,
        image_url: row.get(5)?,
        language: row.get(6)?,
        dialect: dialect.and_then(|d| d.parse().ok()),
        etag: row.get(8)?,
        last_modified: row.get(9)?,
        last_fetched_at: row.get(10)?,
        last_error_code: row.get(11)?,
        last_error_message: row.get(12)?,
        error_count: u32::try_from(error_count).unwrap_or(u32::MAX),
        created_at: row.get(14)?,
    })
}

impl SubscriptionRepository for SqliteSubscriptionRepository {
    fn add(&self, subscription: &Subscription) -> FeedsmithResult<i64> {
        let conn = self.storage.connection()?;

        // Same connection, so the check and the insert cannot deadlock
        let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM subscriptions WHERE feed_url = ?1)")?;
        let exists: bool = stmt.query_row([&subscription.feed_url], |row| row.get(0))?;
        drop(stmt);

        if exists {
            return Err(FeedsmithError::SubscriptionAlreadyExists(subscription.feed_url.clone()));
        }

        conn.execute(
            "INSERT INTO subscriptions (feed_url, title, description, site_url, image_url, language, dialect, etag, last_modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                subscription.feed_url,
                subscription.title,
                subscription.description,
                subscription.site_url,
                subscription.image_url,
                subscription.language,
                subscription.dialect.map(|d| d.as_str()),
                subscription.etag,
                subscription.last_modified,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn remove(&self, id: i64) -> FeedsmithResult<()> {
        let conn = self.storage.connection()?;
        let removed = conn.execute("DELETE FROM subscriptions WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(FeedsmithError::SubscriptionNotFound(id.to_string()));
        }
        Ok(())
    }

    fn get_all(&self) -> FeedsmithResult<Vec<Subscription>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM subscriptions ORDER BY title COLLATE NOCASE, id",
            COLUMNS
        ))?;

        let subscriptions = stmt.query_map([], row_to_subscription)?;
        subscriptions.collect::<Result<Vec<_>, _>>().map_err(FeedsmithError::from)
    }

    fn get_by_id(&self, id: i64) -> FeedsmithResult<Option<Subscription>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM subscriptions WHERE id = ?1", COLUMNS))?;

        match stmt.query_row([id], row_to_subscription) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(FeedsmithError::from(e)),
        }
    }

    fn exists(&self, feed_url: &str) -> FeedsmithResult<bool> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM subscriptions WHERE feed_url = ?1)")?;
        let exists: bool = stmt.query_row([feed_url], |row| row.get(0))?;
        Ok(exists)
    }

    fn update_metadata(&self, id: i64, document: &FeedDocument) -> FeedsmithResult<()> {
        let conn = self.storage.connection()?;
        conn.execute(
            "UPDATE subscriptions SET title = ?2, description = ?3, site_url = ?4, image_url = ?5, \
             language = ?6, dialect = ?7 WHERE id = ?1",
            rusqlite::params![
                id,
                document.title,
                document.description,
                document.site_url,
                document.image_url,
                document.language,
                document.dialect.as_str(),
            ],
        )?;
        Ok(())
    }

    fn record_fetch(
        &self,
        id: i64,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> FeedsmithResult<()> {
        let conn = self.storage.connection()?;
        conn.execute(
            "UPDATE subscriptions SET etag = ?2, last_modified = ?3, last_fetched_at = datetime('now'), \
             last_error_code = NULL, last_error_message = NULL, error_count = 0 WHERE id = ?1",
            rusqlite::params![id, etag, last_modified],
        )?;
        Ok(())
    }

    fn record_error(&self, id: i64, code: &str, message: &str) -> FeedsmithResult<()> {
        let conn = self.storage.connection()?;
        conn.execute(
            "UPDATE subscriptions SET last_error_code = ?2, last_error_message = ?3, \
             error_count = error_count + 1, last_fetched_at = datetime('now') WHERE id = ?1",
            rusqlite::params![id, code, message],
        )?;
        Ok(())
    }
}
