use rayon::prelude::*;
use tracing::debug;

use crate::domain::{ArticleCandidate, FeedDocument};
use crate::errors::IngestError;
use crate::pipeline::deriver::ArticleDeriver;
use crate::pipeline::normalizer::Normalizer;
use crate::pipeline::traits::{FeedFetcher, FetchOptions, FetchOutcome};

/// Everything one successful fetch produced.
#[derive(Debug, Clone)]
pub struct IngestedFeed {
    pub document: FeedDocument,
    pub articles: Vec<ArticleCandidate>,
    pub final_url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Updated(IngestedFeed),
    /// The server reported no change; stored articles must be left alone.
    NotModified {
        etag: Option<String>,
        last_modified: Option<String>,
    },
}

/// fetch → normalize → derive for a single feed.
pub struct FeedIngestor<F: FeedFetcher> {
    fetcher: F,
    normalizer: Normalizer,
    deriver: ArticleDeriver,
}

impl<F: FeedFetcher> FeedIngestor<F> {
    pub fn new(fetcher: F, deriver: ArticleDeriver) -> Self {
        Self {
            fetcher,
            normalizer: Normalizer::new(),
            deriver,
        }
    }

    pub fn ingest(&self, feed_url: &str, options: &FetchOptions) -> Result<IngestOutcome, IngestError> {
        let fetched = match self.fetcher.fetch(feed_url, options)? {
            FetchOutcome::NotModified {
                etag,
                last_modified,
            } => {
                debug!(url = feed_url, "feed not modified");
                return Ok(IngestOutcome::NotModified {
                    etag,
                    last_modified,
                });
            }
            FetchOutcome::Modified(fetched) => fetched,
        };

        let document = self.normalizer.normalize(&fetched.body, &fetched.final_url)?;
        let articles = self.derive_all(&document);

        Ok(IngestOutcome::Updated(IngestedFeed {
            document,
            articles,
            final_url: fetched.final_url,
            etag: fetched.etag,
            last_modified: fetched.last_modified,
        }))
    }

    /// Entries are independent, so they are derived in parallel; order is kept.
    pub fn derive_all(&self, document: &FeedDocument) -> Vec<ArticleCandidate> {
        document
            .entries
            .par_iter()
            .map(|entry| self.deriver.derive(entry))
            .collect()
    }
}
