use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;

use feedsmith::cli::{Cli, Commands};
use feedsmith::config::Config;
use feedsmith::errors::FeedsmithError;
use feedsmith::logging;
use feedsmith::pipeline::{
    ArticleDeriver, FeedIngestor, FetchOptions, HttpFetcher, IngestOutcome,
};
use feedsmith::services::{ArticleService, RefreshService, SubscriptionService};
use feedsmith::storage::sqlite::{
    SqliteArticleRepository, SqliteStorage, SqliteSubscriptionRepository,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    logging::init();

    // Initialize storage
    let storage = SqliteStorage::new(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path))?;

    match cli.command {
        Commands::Add { url } => cmd_add(&url, &storage, &config),
        Commands::Remove => cmd_remove(&storage, &config),
        Commands::List => cmd_list(&storage, &config),
        Commands::Refresh => cmd_refresh(&storage, &config),
        Commands::Articles {
            subscription,
            limit,
        } => cmd_articles(&storage, subscription, limit),
        Commands::Inspect { url, json } => cmd_inspect(&url, &config, json),
    }
}

fn ingestor(config: &Config) -> FeedIngestor<HttpFetcher> {
    FeedIngestor::new(
        HttpFetcher::new(&config.user_agent),
        ArticleDeriver::new(config.derive.clone()),
    )
}

fn subscription_service(
    storage: &SqliteStorage,
    config: &Config,
) -> SubscriptionService<SqliteSubscriptionRepository, HttpFetcher> {
    SubscriptionService::new(
        SqliteSubscriptionRepository::new(storage.clone()),
        ingestor(config),
        config.timeout,
    )
}

fn cmd_add(url: &str, storage: &SqliteStorage, config: &Config) -> anyhow::Result<()> {
    let service = subscription_service(storage, config);

    println!("Validating feed: {}", url);

    match service.add(url) {
        Ok(subscription) => {
            println!("Subscribed!");
            println!("  Title: {}", subscription.title);
            if let Some(dialect) = subscription.dialect {
                println!("  Format: {}", dialect);
            }
            if let Some(id) = subscription.id {
                println!("  ID: {}", id);
            }
            println!("Run `feedsmith refresh` to download its articles.");
            Ok(())
        }
        Err(FeedsmithError::SubscriptionAlreadyExists(feed_url)) => {
            println!("Already subscribed: {}", feed_url);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_remove(storage: &SqliteStorage, config: &Config) -> anyhow::Result<()> {
    let service = subscription_service(storage, config);
    let subscriptions = service.list()?;

    if subscriptions.is_empty() {
        println!("No subscriptions to remove.");
        return Ok(());
    }

    println!("Select a subscription to remove:\n");
    for (i, subscription) in subscriptions.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, subscription.title, subscription.feed_url);
    }
    println!();

    print!("Enter number (or 'q' to cancel): ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.eq_ignore_ascii_case("q") {
        println!("Cancelled.");
        return Ok(());
    }

    let index: usize = input
        .parse()
        .map_err(|_| FeedsmithError::InvalidInput("Invalid number".to_string()))?;

    if index == 0 || index > subscriptions.len() {
        return Err(FeedsmithError::InvalidInput("Number out of range".to_string()).into());
    }

    let subscription = &subscriptions[index - 1];
    let id = subscription
        .id
        .ok_or_else(|| FeedsmithError::SubscriptionNotFound("Subscription has no ID".to_string()))?;

    service.remove(id)?;
    println!("Removed: {}", subscription.title);

    Ok(())
}

fn cmd_list(storage: &SqliteStorage, config: &Config) -> anyhow::Result<()> {
    let service = subscription_service(storage, config);
    let articles = ArticleService::new(
        SqliteSubscriptionRepository::new(storage.clone()),
        SqliteArticleRepository::new(storage.clone()),
    );
    let subscriptions = service.list()?;

    if subscriptions.is_empty() {
        println!("No subscriptions yet.");
        return Ok(());
    }

    println!("Subscriptions:\n");
    for subscription in subscriptions {
        let id = subscription.id.unwrap_or_default();
        match subscription.dialect {
            Some(dialect) => println!("  [{}] {} [{}]", id, subscription.title, dialect),
            None => println!("  [{}] {}", id, subscription.title),
        }
        println!("    URL: {}", subscription.feed_url);
        println!("    Articles: {}", articles.count(id)?);
        if let Some(fetched) = &subscription.last_fetched_at {
            println!("    Last fetched: {}", fetched);
        }
        if subscription.is_erroring() {
            println!(
                "    Error ({} in a row): {} {}",
                subscription.error_count,
                subscription.last_error_code.as_deref().unwrap_or_default(),
                subscription.last_error_message.as_deref().unwrap_or_default()
            );
        }
        println!();
    }

    Ok(())
}

fn cmd_refresh(storage: &SqliteStorage, config: &Config) -> anyhow::Result<()> {
    let service = RefreshService::new(
        SqliteSubscriptionRepository::new(storage.clone()),
        SqliteArticleRepository::new(storage.clone()),
        ingestor(config),
        config.timeout,
        config.concurrency,
    );

    println!("Refreshing subscriptions...\n");

    let results = service.refresh_all()?;

    if results.is_empty() {
        println!("No subscriptions to refresh.");
        return Ok(());
    }

    let mut total_new = 0;
    let mut failed = 0;

    for (subscription, result) in &results {
        match result {
            Ok(report) if report.not_modified => {
                println!("  {}: not modified", subscription.title);
            }
            Ok(report) => {
                total_new += report.inserted;
                print!(
                    "  {}: {} new, {} updated, {} unchanged",
                    subscription.title, report.inserted, report.updated, report.unchanged
                );
                if report.skipped_entries > 0 {
                    print!(", {} malformed skipped", report.skipped_entries);
                }
                println!();
            }
            Err(e) => {
                failed += 1;
                println!("  {}: FAILED: {}", subscription.title, e);
            }
        }
    }

    println!(
        "\nRefreshed {} subscriptions: {} new articles, {} failed.",
        results.len(),
        total_new,
        failed
    );

    Ok(())
}

fn cmd_articles(storage: &SqliteStorage, subscription: Option<i64>, limit: usize) -> anyhow::Result<()> {
    let service = ArticleService::new(
        SqliteSubscriptionRepository::new(storage.clone()),
        SqliteArticleRepository::new(storage.clone()),
    );
    let articles = service.recent(subscription, limit)?;

    if articles.is_empty() {
        println!("No articles stored.");
        return Ok(());
    }

    for stored in articles {
        let article = stored.article;
        let date = article
            .published_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "undated".to_string());

        println!("{} ({} min read)", article.title, article.reading_time);
        println!("  {}", date);
        if !article.url.is_empty() {
            println!("  {}", article.url);
        }
        if let Some(summary) = &article.summary {
            println!("  {}", summary);
        }
        println!();
    }

    Ok(())
}

fn cmd_inspect(url: &str, config: &Config, json: bool) -> anyhow::Result<()> {
    let feed_url = feedsmith::services::subscription_service::validate_url(url)?;
    let options = FetchOptions::default().with_timeout(config.timeout);

    let feed = match ingestor(config)
        .ingest(&feed_url, &options)
        .with_context(|| format!("Failed to ingest {}", feed_url))?
    {
        IngestOutcome::Updated(feed) => feed,
        IngestOutcome::NotModified { .. } => {
            println!("Server reported the feed as not modified.");
            return Ok(());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&feed.articles)?);
        return Ok(());
    }

    let document = &feed.document;
    println!("{} [{}]", document.title, document.dialect);
    println!("  Feed: {}", feed.final_url);
    if let Some(site) = &document.site_url {
        println!("  Site: {}", site);
    }
    if let Some(description) = &document.description {
        println!("  {}", description);
    }
    println!(
        "  {} entries, {} malformed skipped\n",
        feed.articles.len(),
        document.skipped_entries
    );

    for article in &feed.articles {
        println!("  - {}", article.title);
        println!("    guid: {}", article.guid);
        if !article.url.is_empty() {
            println!("    url: {}", article.url);
        }
        if let Some(published) = article.published_at {
            println!("    published: {}", published.to_rfc3339());
        }
        println!("    reading time: {} min", article.reading_time);
    }

    Ok(())
}
