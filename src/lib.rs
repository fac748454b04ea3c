//! Feed ingestion for a personal RSS/Atom reader: conditional fetching,
//! lenient normalization of RSS 2.0, Atom and RSS 1.0 (RDF), and derivation
//! of stable, deduplicatable articles.

pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod services;
pub mod storage;
