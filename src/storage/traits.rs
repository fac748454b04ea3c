use crate::domain::{ArticleCandidate, FeedDocument, StoredArticle, Subscription, UpsertOutcome};
use crate::errors::FeedsmithResult;

#[cfg_attr(test, mockall::automock)]
pub trait SubscriptionRepository: Send + Sync {
    fn add(&self, subscription: &Subscription) -> FeedsmithResult<i64>;
    fn remove(&self, id: i64) -> FeedsmithResult<()>;
    fn get_all(&self) -> FeedsmithResult<Vec<Subscription>>;
    fn get_by_id(&self, id: i64) -> FeedsmithResult<Option<Subscription>>;
    fn exists(&self, feed_url: &str) -> FeedsmithResult<bool>;
    fn update_metadata(&self, id: i64, document: &FeedDocument) -> FeedsmithResult<()>;
    /// Store new conditional-GET validators and clear any error state.
    fn record_fetch(
        &self,
        id: i64,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> FeedsmithResult<()>;
    /// Mark the subscription as erroring. Stored articles are not touched.
    fn record_error(&self, id: i64, code: &str, message: &str) -> FeedsmithResult<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ArticleRepository: Send + Sync {
    /// Insert-or-update keyed on `(subscription_id, guid)`; the content hash
    /// decides between `Updated` and `Unchanged`.
    fn upsert(&self, subscription_id: i64, article: &ArticleCandidate) -> FeedsmithResult<UpsertOutcome>;
    /// Newest first, undated articles last.
    fn list(&self, subscription_id: Option<i64>, limit: usize) -> FeedsmithResult<Vec<StoredArticle>>;
    fn count(&self, subscription_id: i64) -> FeedsmithResult<usize>;
}
