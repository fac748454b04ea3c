use std::time::Duration;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{Subscription, UpsertOutcome};
use crate::errors::{FeedsmithError, FeedsmithResult};
use crate::pipeline::{FeedFetcher, FeedIngestor, FetchOptions, IngestOutcome};
use crate::storage::traits::{ArticleRepository, SubscriptionRepository};

/// What one refresh of one subscription did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub subscription_id: i64,
    pub not_modified: bool,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_entries: usize,
}

impl RefreshReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

pub struct RefreshService<S, A, F>
where
    S: SubscriptionRepository,
    A: ArticleRepository,
    F: FeedFetcher,
{
    subscriptions: S,
    articles: A,
    ingestor: FeedIngestor<F>,
    timeout: Duration,
    concurrency: usize,
}

impl<S, A, F> RefreshService<S, A, F>
where
    S: SubscriptionRepository,
    A: ArticleRepository,
    F: FeedFetcher,
{
    pub fn new(
        subscriptions: S,
        articles: A,
        ingestor: FeedIngestor<F>,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            subscriptions,
            articles,
            ingestor,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Refresh one subscription using its stored validators.
    /// On failure the error state is recorded and stored articles are left alone.
    pub fn refresh(&self, subscription: &Subscription) -> FeedsmithResult<RefreshReport> {
        let id = subscription.id.ok_or_else(|| {
            FeedsmithError::SubscriptionNotFound("Subscription has no ID".to_string())
        })?;

        let options = FetchOptions::default()
            .with_timeout(self.timeout)
            .with_validators(subscription.etag.clone(), subscription.last_modified.clone());

        let feed = match self.ingestor.ingest(&subscription.feed_url, &options) {
            Ok(IngestOutcome::Updated(feed)) => feed,
            Ok(IngestOutcome::NotModified {
                etag,
                last_modified,
            }) => {
                self.subscriptions.record_fetch(id, etag, last_modified)?;
                info!(subscription = id, "not modified");
                return Ok(RefreshReport {
                    subscription_id: id,
                    not_modified: true,
                    ..RefreshReport::default()
                });
            }
            Err(e) => {
                warn!(subscription = id, url = %subscription.feed_url, code = e.code(), "refresh failed: {}", e);
                self.subscriptions.record_error(id, e.code(), &e.to_string())?;
                return Err(e.into());
            }
        };

        self.subscriptions.update_metadata(id, &feed.document)?;

        let mut report = RefreshReport {
            subscription_id: id,
            skipped_entries: feed.document.skipped_entries,
            ..RefreshReport::default()
        };
        for article in &feed.articles {
            match self.articles.upsert(id, article) {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(subscription = id, guid = %article.guid, code = e.code(), "storing article failed: {}", e);
                    self.subscriptions.record_error(id, e.code(), &e.to_string())?;
                    return Err(e);
                }
            }
        }

        // Validators are stored last so an interrupted refresh downloads again
        self.subscriptions
            .record_fetch(id, feed.etag, feed.last_modified)?;

        info!(
            subscription = id,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped_entries,
            "refreshed"
        );

        Ok(report)
    }

    /// Refresh every subscription in parallel. One failure never stops the others.
    pub fn refresh_all(&self) -> FeedsmithResult<Vec<(Subscription, FeedsmithResult<RefreshReport>)>> {
        let subscriptions = self.subscriptions.get_all()?;
        if subscriptions.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
            .map_err(|e| FeedsmithError::Config(format!("Failed to start refresh workers: {}", e)))?;

        let results = pool.install(|| {
            subscriptions
                .into_par_iter()
                .map(|subscription| {
                    let result = self.refresh(&subscription);
                    (subscription, result)
                })
                .collect()
        });

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use crate::pipeline::traits::{FetchOutcome, FetchedFeed, MockFeedFetcher};
    use crate::pipeline::ArticleDeriver;
    use crate::storage::sqlite::{SqliteArticleRepository, SqliteStorage, SqliteSubscriptionRepository};
    use crate::storage::traits::MockArticleRepository;

    const FEED_V1: &str = r#"<rss version="2.0"><channel><title>Example</title>
<link>https://example.com/</link>
<item><guid>a</guid><title>First</title><description>one</description><pubDate>Sat, 01 Jun 2024 10:00:00 GMT</pubDate></item>
<item><guid>b</guid><title>Second</title><description>two</description><pubDate>Sun, 02 Jun 2024 10:00:00 GMT</pubDate></item>
</channel></rss>"#;

    const FEED_V2: &str = r#"<rss version="2.0"><channel><title>Example Renamed</title>
<item><guid>a</guid><title>First</title><description>one, edited</description><pubDate>Sat, 01 Jun 2024 10:00:00 GMT</pubDate></item>
<item><guid>b</guid><title>Second</title><description>two</description><pubDate>Sun, 02 Jun 2024 10:00:00 GMT</pubDate></item>
<item><guid>c</guid><title>Third</title><description>three</description><pubDate>Mon, 03 Jun 2024 10:00:00 GMT</pubDate></item>
</channel></rss>"#;

    type Service = RefreshService<SqliteSubscriptionRepository, SqliteArticleRepository, MockFeedFetcher>;

    fn modified(body: &str, etag: &str) -> FetchOutcome {
        FetchOutcome::Modified(FetchedFeed {
            body: body.to_string(),
            final_url: "https://example.com/feed".to_string(),
            status: 200,
            etag: Some(etag.to_string()),
            last_modified: None,
        })
    }

    fn setup(fetcher: MockFeedFetcher, urls: &[&str]) -> (Service, SqliteStorage, Vec<Subscription>) {
        let storage = SqliteStorage::in_memory().unwrap();
        let subscriptions = SqliteSubscriptionRepository::new(storage.clone());
        for url in urls {
            subscriptions
                .add(&Subscription::new(url.to_string(), "Pending".to_string()))
                .unwrap();
        }
        let stored = subscriptions.get_all().unwrap();

        let service = RefreshService::new(
            subscriptions,
            SqliteArticleRepository::new(storage.clone()),
            FeedIngestor::new(fetcher, ArticleDeriver::default()),
            Duration::from_secs(5),
            2,
        );
        (service, storage, stored)
    }

    fn reload(storage: &SqliteStorage, id: i64) -> Subscription {
        SqliteSubscriptionRepository::new(storage.clone())
            .get_by_id(id)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_refresh_all_empty() {
        let (service, _, _) = setup(MockFeedFetcher::new(), &[]);
        assert!(service.refresh_all().unwrap().is_empty());
    }

    #[test]
    fn test_first_refresh_inserts_and_stores_validators() {
        let mut fetcher = MockFeedFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|_, options| options.etag.is_none())
            .returning(|_, _| Ok(modified(FEED_V1, "\"v1\"")));
        let (service, storage, subs) = setup(fetcher, &["https://example.com/feed"]);

        let report = service.refresh(&subs[0]).unwrap();

        assert_eq!(report.inserted, 2);
        assert!(!report.not_modified);

        let sub = reload(&storage, report.subscription_id);
        assert_eq!(sub.title, "Example");
        assert_eq!(sub.etag.as_deref(), Some("\"v1\""));
        assert!(sub.last_fetched_at.is_some());
    }

    #[test]
    fn test_changed_feed_updates_inserts_and_keeps_the_rest() {
        let mut fetcher = MockFeedFetcher::new();
        let mut seq = mockall::Sequence::new();
        fetcher
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(modified(FEED_V1, "\"v1\"")));
        fetcher
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, options| options.etag.as_deref() == Some("\"v1\""))
            .returning(|_, _| Ok(modified(FEED_V2, "\"v2\"")));
        let (service, storage, subs) = setup(fetcher, &["https://example.com/feed"]);

        service.refresh(&subs[0]).unwrap();
        let sub = reload(&storage, subs[0].id.unwrap());
        let report = service.refresh(&sub).unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(reload(&storage, report.subscription_id).title, "Example Renamed");
    }

    #[test]
    fn test_not_modified_leaves_articles_untouched() {
        let mut fetcher = MockFeedFetcher::new();
        let mut seq = mockall::Sequence::new();
        fetcher
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(modified(FEED_V1, "\"v1\"")));
        fetcher
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, options| {
                Ok(FetchOutcome::NotModified {
                    etag: options.etag.clone(),
                    last_modified: None,
                })
            });
        let (service, storage, subs) = setup(fetcher, &["https://example.com/feed"]);
        let articles = SqliteArticleRepository::new(storage.clone());

        service.refresh(&subs[0]).unwrap();
        let before = articles.list(None, 10).unwrap();

        let sub = reload(&storage, subs[0].id.unwrap());
        let report = service.refresh(&sub).unwrap();

        assert!(report.not_modified);
        assert_eq!(report.inserted + report.updated + report.unchanged, 0);
        let after = articles.list(None, 10).unwrap();
        assert_eq!(
            before.iter().map(|a| (&a.article, &a.updated_at)).collect::<Vec<_>>(),
            after.iter().map(|a| (&a.article, &a.updated_at)).collect::<Vec<_>>()
        );
        assert_eq!(reload(&storage, sub.id.unwrap()).etag.as_deref(), Some("\"v1\""));
    }

    #[test]
    fn test_failure_records_error_and_keeps_articles() {
        let mut fetcher = MockFeedFetcher::new();
        let mut seq = mockall::Sequence::new();
        fetcher
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(modified(FEED_V1, "\"v1\"")));
        fetcher
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|url, _| Err(FetchError::from_status(url, 404)));
        let (service, storage, subs) = setup(fetcher, &["https://example.com/feed"]);
        let articles = SqliteArticleRepository::new(storage.clone());

        service.refresh(&subs[0]).unwrap();
        let err = service.refresh(&subs[0]).unwrap_err();

        assert!(matches!(err, FeedsmithError::Ingest(_)));
        let sub = reload(&storage, subs[0].id.unwrap());
        assert_eq!(sub.last_error_code.as_deref(), Some("NOT_FOUND"));
        assert_eq!(sub.error_count, 1);
        assert_eq!(sub.etag.as_deref(), Some("\"v1\""));
        assert_eq!(articles.list(None, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_storage_failure_records_error_and_keeps_validators() {
        let mut fetcher = MockFeedFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_, _| Ok(modified(FEED_V1, "\"v1\"")));
        let mut articles = MockArticleRepository::new();
        articles
            .expect_upsert()
            .times(1)
            .returning(|_, _| Err(FeedsmithError::Database(rusqlite::Error::InvalidQuery)));

        let storage = SqliteStorage::in_memory().unwrap();
        let subscriptions = SqliteSubscriptionRepository::new(storage.clone());
        let id = subscriptions
            .add(&Subscription::new("https://example.com/feed".to_string(), "Pending".to_string()))
            .unwrap();
        let subscription = subscriptions.get_by_id(id).unwrap().unwrap();
        let service = RefreshService::new(
            subscriptions,
            articles,
            FeedIngestor::new(fetcher, ArticleDeriver::default()),
            Duration::from_secs(5),
            1,
        );

        let err = service.refresh(&subscription).unwrap_err();

        assert!(matches!(err, FeedsmithError::Database(_)));
        let sub = reload(&storage, id);
        assert_eq!(sub.last_error_code.as_deref(), Some("STORAGE_ERROR"));
        assert_eq!(sub.error_count, 1);
        assert!(sub.etag.is_none());
    }

    #[test]
    fn test_refresh_all_isolates_failures() {
        let mut fetcher = MockFeedFetcher::new();
        fetcher.expect_fetch().returning(|url, _| {
            if url.contains("broken") {
                Err(FetchError::from_status(url, 500))
            } else {
                Ok(modified(FEED_V1, "\"v1\""))
            }
        });
        let (service, _, _) = setup(
            fetcher,
            &["https://example.com/feed", "https://broken.example.com/feed"],
        );

        let results = service.refresh_all().unwrap();

        assert_eq!(results.len(), 2);
        for (subscription, result) in &results {
            if subscription.feed_url.contains("broken") {
                assert!(result.is_err());
            } else {
                assert_eq!(result.as_ref().unwrap().inserted, 2);
            }
        }
    }

    #[test]
    fn test_refresh_without_id_is_rejected() {
        let (service, _, _) = setup(MockFeedFetcher::new(), &[]);
        let orphan = Subscription::new("https://example.com/feed".to_string(), "Orphan".to_string());

        assert!(matches!(
            service.refresh(&orphan),
            Err(FeedsmithError::SubscriptionNotFound(_))
        ));
    }
}
