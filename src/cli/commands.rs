use clap::{Parser, Subcommand};

use crate::services::DEFAULT_ARTICLE_LIMIT;

#[derive(Parser)]
#[command(name = "feedsmith")]
#[command(about = "Personal RSS/Atom/RDF feed reader with conditional fetching")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to a feed URL (RSS 2.0, Atom or RSS 1.0/RDF)
    Add {
        /// Feed URL to subscribe to
        url: String,
    },

    /// Remove a subscription (interactive selection)
    Remove,

    /// List all subscriptions
    List,

    /// Fetch every subscription and store new or changed articles
    Refresh,

    /// Show stored articles, newest first
    Articles {
        /// Only show articles from this subscription ID
        #[arg(short, long)]
        subscription: Option<i64>,

        /// Maximum number of articles to show
        #[arg(short, long, default_value_t = DEFAULT_ARTICLE_LIMIT)]
        limit: usize,
    },

    /// Fetch a feed and show what would be stored, without storing anything
    Inspect {
        /// Feed URL to inspect
        url: String,

        /// Print the derived articles as JSON
        #[arg(long)]
        json: bool,
    },
}
