//! Feed ingestion pipeline: fetch → normalize → derive.

pub mod deriver;
pub mod fetcher;
pub mod ingestor;
pub mod normalizer;
pub mod text;
pub mod traits;
pub mod xml_tree;

pub use deriver::{ArticleDeriver, DeriveOptions};
pub use fetcher::HttpFetcher;
pub use ingestor::{FeedIngestor, IngestOutcome, IngestedFeed};
pub use normalizer::Normalizer;
pub use traits::{FeedFetcher, FetchOptions, FetchOutcome, FetchedFeed};
