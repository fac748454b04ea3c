use std::time::Duration;

use tracing::info;
use url::Url;

use crate::domain::Subscription;
use crate::errors::{FeedsmithError, FeedsmithResult};
use crate::pipeline::{FeedFetcher, FeedIngestor, FetchOptions, IngestOutcome};
use crate::storage::traits::SubscriptionRepository;

pub struct SubscriptionService<R: SubscriptionRepository, F: FeedFetcher> {
    repository: R,
    ingestor: FeedIngestor<F>,
    timeout: Duration,
}

impl<R: SubscriptionRepository, F: FeedFetcher> SubscriptionService<R, F> {
    pub fn new(repository: R, ingestor: FeedIngestor<F>, timeout: Duration) -> Self {
        Self {
            repository,
            ingestor,
            timeout,
        }
    }

    /// Subscribe to a feed URL.
    /// The feed is fetched once to prove it parses and to take its metadata.
    /// No validators are kept, so the first refresh downloads the articles.
    pub fn add(&self, url: &str) -> FeedsmithResult<Subscription> {
        let feed_url = validate_url(url)?;

        if self.repository.exists(&feed_url)? {
            return Err(FeedsmithError::SubscriptionAlreadyExists(feed_url));
        }

        let options = FetchOptions::default().with_timeout(self.timeout);
        let subscription = match self.ingestor.ingest(&feed_url, &options)? {
            IngestOutcome::Updated(feed) => {
                info!(
                    url = %feed_url,
                    dialect = %feed.document.dialect,
                    entries = feed.articles.len(),
                    "validated feed"
                );
                Subscription::from_document(feed_url, &feed.document)
            }
            // Only possible with a misbehaving server, since nothing was sent to match against
            IngestOutcome::NotModified { .. } => Subscription::new(feed_url.clone(), feed_url),
        };

        let id = self.repository.add(&subscription)?;

        Ok(Subscription {
            id: Some(id),
            ..subscription
        })
    }

    pub fn remove(&self, id: i64) -> FeedsmithResult<()> {
        self.repository.remove(id)
    }

    pub fn list(&self) -> FeedsmithResult<Vec<Subscription>> {
        self.repository.get_all()
    }

    pub fn get(&self, id: i64) -> FeedsmithResult<Option<Subscription>> {
        self.repository.get_by_id(id)
    }

    pub fn exists(&self, url: &str) -> FeedsmithResult<bool> {
        self.repository.exists(&validate_url(url)?)
    }
}

/// Absolute http(s) URLs only, returned in normalized form.
pub fn validate_url(url: &str) -> FeedsmithResult<String> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| FeedsmithError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(FeedsmithError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            trimmed, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FetchError, FetchErrorKind};
    use crate::pipeline::traits::{FetchOutcome, FetchedFeed, MockFeedFetcher};
    use crate::pipeline::ArticleDeriver;
    use crate::storage::sqlite::{SqliteStorage, SqliteSubscriptionRepository};

    const FEED: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <subtitle>Things</subtitle>
  <link rel="alternate" href="https://example.com/"/>
  <entry><id>urn:1</id><title>First</title><content>Hello</content></entry>
</feed>"#;

    fn setup(fetcher: MockFeedFetcher) -> SubscriptionService<SqliteSubscriptionRepository, MockFeedFetcher> {
        let storage = SqliteStorage::in_memory().unwrap();
        let repo = SqliteSubscriptionRepository::new(storage);
        let ingestor = FeedIngestor::new(fetcher, ArticleDeriver::default());
        SubscriptionService::new(repo, ingestor, Duration::from_secs(5))
    }

    fn serving(body: &'static str) -> MockFeedFetcher {
        let mut fetcher = MockFeedFetcher::new();
        fetcher.expect_fetch().returning(move |url, _| {
            Ok(FetchOutcome::Modified(FetchedFeed {
                body: body.to_string(),
                final_url: url.to_string(),
                status: 200,
                etag: Some("\"v1\"".to_string()),
                last_modified: None,
            }))
        });
        fetcher
    }

    #[test]
    fn test_list_empty() {
        let service = setup(MockFeedFetcher::new());
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn test_add_takes_metadata_but_not_validators() {
        let service = setup(serving(FEED));

        let subscription = service.add("https://example.com/atom.xml").unwrap();

        assert!(subscription.id.is_some());
        assert_eq!(subscription.title, "Example Atom");
        assert_eq!(subscription.description.as_deref(), Some("Things"));

        let stored = service.get(subscription.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.site_url.as_deref(), Some("https://example.com/"));
        assert!(stored.etag.is_none());
        assert!(service.exists("https://example.com/atom.xml").unwrap());
    }

    #[test]
    fn test_add_rejects_duplicates_without_fetching_again() {
        let mut fetcher = MockFeedFetcher::new();
        fetcher.expect_fetch().times(1).returning(|url, _| {
            Ok(FetchOutcome::Modified(FetchedFeed {
                body: FEED.to_string(),
                final_url: url.to_string(),
                status: 200,
                etag: None,
                last_modified: None,
            }))
        });
        let service = setup(fetcher);

        service.add("https://example.com/atom.xml").unwrap();
        let result = service.add("https://example.com/atom.xml");

        assert!(matches!(result, Err(FeedsmithError::SubscriptionAlreadyExists(_))));
    }

    #[test]
    fn test_add_rejects_bad_urls() {
        let service = setup(MockFeedFetcher::new());

        assert!(matches!(service.add("not a url"), Err(FeedsmithError::InvalidUrl(_))));
        assert!(matches!(
            service.add("ftp://example.com/feed"),
            Err(FeedsmithError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_add_surfaces_fetch_and_parse_failures() {
        let mut fetcher = MockFeedFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|url, _| Err(FetchError::from_status(url, 404)));
        let service = setup(fetcher);

        let err = service.add("https://example.com/missing").unwrap_err();
        assert!(matches!(err, FeedsmithError::Ingest(_)));
        assert!(service.list().unwrap().is_empty());

        let service = setup(serving("<html><body>hello</body></html>"));
        let err = service.add("https://example.com/page").unwrap_err();
        assert!(matches!(err, FeedsmithError::Ingest(_)));

        let mut fetcher = MockFeedFetcher::new();
        fetcher.expect_fetch().returning(|url, _| {
            Err(FetchError::new(FetchErrorKind::Network, url, "connection refused"))
        });
        assert!(setup(fetcher).add("https://example.com/down").is_err());
    }

    #[test]
    fn test_validate_url_normalizes() {
        assert_eq!(validate_url("  https://Example.com ").unwrap(), "https://example.com/");
    }
}
