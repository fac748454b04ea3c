use serde::{Deserialize, Serialize};

pub const UNTITLED_FEED: &str = "Untitled Feed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedDialect {
    Rss,
    Atom,
    Rdf,
}

impl FeedDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedDialect::Rss => "rss",
            FeedDialect::Atom => "atom",
            FeedDialect::Rdf => "rdf",
        }
    }
}

impl std::str::FromStr for FeedDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rss" => Ok(FeedDialect::Rss),
            "atom" => Ok(FeedDialect::Atom),
            "rdf" => Ok(FeedDialect::Rdf),
            _ => Err(format!("Unknown feed dialect: {}", s)),
        }
    }
}

impl std::fmt::Display for FeedDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A feed as parsed from one fetch. Built fresh every time and never stored as-is.
#[derive(Debug, Clone, Serialize)]
pub struct FeedDocument {
    pub dialect: FeedDialect,
    pub title: String,
    pub description: Option<String>,
    pub site_url: Option<String>,
    pub feed_url: String,
    pub image_url: Option<String>,
    pub language: Option<String>,
    /// Document order, not necessarily chronological.
    pub entries: Vec<RawEntry>,
    /// Entries dropped because they were malformed.
    pub skipped_entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: Option<String>,
    pub length: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaContent {
    pub url: String,
    pub mime_type: Option<String>,
    pub medium: Option<String>,
}

/// One entry exactly as the source document described it. Every field is
/// optional; nothing is parsed or cleaned yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawEntry {
    pub guid: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub pub_date: Option<String>,
    pub iso_date: Option<String>,
    pub dc_date: Option<String>,
    pub author: Option<String>,
    pub content_encoded: Option<String>,
    pub content: Option<String>,
    pub content_snippet: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub enclosure: Option<Enclosure>,
    pub media_thumbnail: Option<String>,
    pub media_content: Option<MediaContent>,
}

impl RawEntry {
    /// True when the entry carries nothing an article could be built from.
    pub fn is_empty(&self) -> bool {
        [
            &self.guid,
            &self.title,
            &self.link,
            &self.content_encoded,
            &self.content,
            &self.content_snippet,
            &self.summary,
            &self.description,
        ]
        .iter()
        .all(|field| field.as_deref().map_or(true, |v| v.trim().is_empty()))
    }
}
