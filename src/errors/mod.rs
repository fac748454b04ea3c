use std::fmt;

use thiserror::Error;

/// Coarse classification of a failed fetch, used by callers for retry and
/// backoff decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    Network,
    NotFound,
    Forbidden,
    Unauthorized,
    Unknown,
}

impl FetchErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "TIMEOUT",
            FetchErrorKind::Network => "NETWORK_ERROR",
            FetchErrorKind::NotFound => "NOT_FOUND",
            FetchErrorKind::Forbidden => "FORBIDDEN",
            FetchErrorKind::Unauthorized => "UNAUTHORIZED",
            FetchErrorKind::Unknown => "UNKNOWN",
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            401 => FetchErrorKind::Unauthorized,
            403 => FetchErrorKind::Forbidden,
            404 => FetchErrorKind::NotFound,
            _ => FetchErrorKind::Unknown,
        }
    }

    /// Fallback classification for transport errors that carry no better signal.
    pub fn from_message(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("timed out") || message.contains("timeout") {
            FetchErrorKind::Timeout
        } else if ["dns", "connect", "connection", "network", "refused", "reset", "unreachable"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            FetchErrorKind::Network
        } else {
            FetchErrorKind::Unknown
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug)]
#[error("{kind} while fetching {url}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub status: Option<u16>,
    pub message: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.to_string(),
            status: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn from_status(url: &str, status: u16) -> Self {
        Self {
            kind: FetchErrorKind::from_status(status),
            url: url.to_string(),
            status: Some(status),
            message: format!("HTTP status {}", status),
            source: None,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Document is empty")]
    Empty,

    #[error("Malformed XML before any feed element: {0}")]
    Malformed(String),

    #[error("Unrecognized feed format: root element <{0}>")]
    UnrecognizedRoot(String),

    #[error("RSS document has no <channel> element")]
    MissingChannel,
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        "PARSE_ERROR"
    }
}

/// Failure of one fetch → normalize cycle for a single feed.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Feed parsing failed: {0}")]
    Parse(#[from] ParseError),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Fetch(e) => e.code(),
            IngestError::Parse(e) => e.code(),
        }
    }
}

#[derive(Error, Debug)]
pub enum FeedsmithError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Subscription errors
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Subscription already exists: {0}")]
    SubscriptionAlreadyExists(String),

    // Pipeline errors
    #[error(transparent)]
    Ingest(#[from] IngestError),

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // User input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FeedsmithError {
    /// Stable code stored on a subscription when a refresh fails.
    pub fn code(&self) -> &'static str {
        match self {
            FeedsmithError::Ingest(e) => e.code(),
            FeedsmithError::Database(_) | FeedsmithError::Serialization(_) => "STORAGE_ERROR",
            FeedsmithError::Io(_) => "IO_ERROR",
            _ => "UNKNOWN",
        }
    }
}

impl From<FetchError> for FeedsmithError {
    fn from(err: FetchError) -> Self {
        FeedsmithError::Ingest(err.into())
    }
}

impl From<ParseError> for FeedsmithError {
    fn from(err: ParseError) -> Self {
        FeedsmithError::Ingest(err.into())
    }
}

pub type FeedsmithResult<T> = Result<T, FeedsmithError>;
