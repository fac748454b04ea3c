use crate::domain::StoredArticle;
use crate::errors::{FeedsmithError, FeedsmithResult};
use crate::storage::traits::{ArticleRepository, SubscriptionRepository};

pub const DEFAULT_ARTICLE_LIMIT: usize = 20;

/// Read side over stored articles.
pub struct ArticleService<S: SubscriptionRepository, A: ArticleRepository> {
    subscriptions: S,
    articles: A,
}

impl<S: SubscriptionRepository, A: ArticleRepository> ArticleService<S, A> {
    pub fn new(subscriptions: S, articles: A) -> Self {
        Self {
            subscriptions,
            articles,
        }
    }

    /// Newest articles first, optionally for a single subscription.
    pub fn recent(&self, subscription_id: Option<i64>, limit: usize) -> FeedsmithResult<Vec<StoredArticle>> {
        if let Some(id) = subscription_id {
            if self.subscriptions.get_by_id(id)?.is_none() {
                return Err(FeedsmithError::SubscriptionNotFound(id.to_string()));
            }
        }
        self.articles.list(subscription_id, limit)
    }

    /// Number of articles stored for a subscription.
    pub fn count(&self, subscription_id: i64) -> FeedsmithResult<usize> {
        self.articles.count(subscription_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArticleCandidate, Subscription};
    use crate::storage::traits::{MockArticleRepository, MockSubscriptionRepository};

    fn stored(id: i64) -> StoredArticle {
        StoredArticle {
            id,
            subscription_id: 1,
            article: ArticleCandidate {
                guid: id.to_string(),
                title: "Title".to_string(),
                url: String::new(),
                content: None,
                content_text: None,
                summary: None,
                author: None,
                published_at: None,
                image_url: None,
                content_hash: "hash".to_string(),
                reading_time: 0,
                categories: Vec::new(),
            },
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_recent_for_unknown_subscription() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_get_by_id().returning(|_| Ok(None));
        let mut articles = MockArticleRepository::new();
        articles.expect_list().never();

        let service = ArticleService::new(subscriptions, articles);

        assert!(matches!(
            service.recent(Some(7), 10),
            Err(FeedsmithError::SubscriptionNotFound(_))
        ));
    }

    #[test]
    fn test_recent_passes_filter_and_limit() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_get_by_id().returning(|id| {
            let mut subscription = Subscription::new("https://example.com/feed".to_string(), "Feed".to_string());
            subscription.id = Some(id);
            Ok(Some(subscription))
        });
        let mut articles = MockArticleRepository::new();
        articles
            .expect_list()
            .withf(|subscription_id, limit| *subscription_id == Some(1) && *limit == 5)
            .returning(|_, _| Ok(vec![stored(1), stored(2)]));

        let service = ArticleService::new(subscriptions, articles);

        assert_eq!(service.recent(Some(1), 5).unwrap().len(), 2);
    }

    #[test]
    fn test_recent_across_all_subscriptions() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_get_by_id().never();
        let mut articles = MockArticleRepository::new();
        articles
            .expect_list()
            .withf(|subscription_id, _| subscription_id.is_none())
            .returning(|_, _| Ok(Vec::new()));

        let service = ArticleService::new(subscriptions, articles);

        assert!(service.recent(None, DEFAULT_ARTICLE_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn test_count_delegates_to_repository() {
        let subscriptions = MockSubscriptionRepository::new();
        let mut articles = MockArticleRepository::new();
        articles
            .expect_count()
            .withf(|subscription_id| *subscription_id == 3)
            .returning(|_| Ok(12));

        let service = ArticleService::new(subscriptions, articles);

        assert_eq!(service.count(3).unwrap(), 12);
    }
}
