use std::time::Duration;

use crate::errors::FetchError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request options. `etag` and `last_modified` are the validators stored
/// from the previous successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            etag: None,
            last_modified: None,
            headers: Vec::new(),
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_validators(mut self, etag: Option<String>, last_modified: Option<String>) -> Self {
        self.etag = etag;
        self.last_modified = last_modified;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFeed {
    pub body: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Modified(FetchedFeed),
    NotModified {
        etag: Option<String>,
        last_modified: Option<String>,
    },
}

#[cfg_attr(test, mockall::automock)]
pub trait FeedFetcher: Send + Sync {
    /// Fetch a feed document. No retries; a timeout aborts the request.
    fn fetch(&self, feed_url: &str, options: &FetchOptions) -> Result<FetchOutcome, FetchError>;
}
