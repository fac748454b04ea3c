use serde::{Deserialize, Serialize};

use super::{FeedDialect, FeedDocument};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Option<i64>,
    pub feed_url: String,
    pub title: String,
    pub description: Option<String>,
    pub site_url: Option<String>,
    pub image_url: Option<String>,
    pub language: Option<String>,
    pub dialect: Option<FeedDialect>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetched_at: Option<String>,
    pub last_error_code: Option<String>,
    pub last_error_message: Option<String>,
    pub error_count: u32,
    pub created_at: Option<String>,
}

impl Subscription {
    pub fn new(feed_url: String, title: String) -> Self {
        Self {
            id: None,
            feed_url,
            title,
            description: None,
            site_url: None,
            image_url: None,
            language: None,
            dialect: None,
            etag: None,
            last_modified: None,
            last_fetched_at: None,
            last_error_code: None,
            last_error_message: None,
            error_count: 0,
            created_at: None,
        }
    }

    /// A fresh subscription described by the first document fetched from it.
    pub fn from_document(feed_url: String, document: &FeedDocument) -> Self {
        let mut subscription = Self::new(feed_url, document.title.clone());
        subscription.apply_document(document);
        subscription
    }

    pub fn apply_document(&mut self, document: &FeedDocument) {
        self.title = document.title.clone();
        self.description = document.description.clone();
        self.site_url = document.site_url.clone();
        self.image_url = document.image_url.clone();
        self.language = document.language.clone();
        self.dialect = Some(document.dialect);
    }

    pub fn is_erroring(&self) -> bool {
        self.last_error_code.is_some()
    }
}
