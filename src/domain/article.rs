use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output of the ingestion pipeline for one entry. `guid` is the persistence
/// key; `content_hash` tells whether the body changed under the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCandidate {
    pub guid: String,
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub content_text: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub content_hash: String,
    pub reading_time: u32,
    pub categories: Vec<String>,
}

/// An article as persisted for a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: i64,
    pub subscription_id: i64,
    #[serde(flatten)]
    pub article: ArticleCandidate,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}
