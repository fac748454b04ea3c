pub mod article;
pub mod feed_document;
pub mod subscription;

pub use article::{ArticleCandidate, StoredArticle, UpsertOutcome};
pub use feed_document::{Enclosure, FeedDialect, FeedDocument, MediaContent, RawEntry, UNTITLED_FEED};
pub use subscription::Subscription;
