use std::str::FromStr;
use std::time::Duration;

use crate::errors::{FeedsmithError, FeedsmithResult};
use crate::pipeline::DeriveOptions;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "feedsmith/",
    env!("CARGO_PKG_VERSION"),
    " (personal feed reader; +https://github.com/feedsmith)"
);

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub concurrency: usize,
    pub derive: DeriveOptions,
}

impl Config {
    /// Get the directory where the executable is located
    fn exe_dir() -> Option<std::path::PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn from_env() -> FeedsmithResult<Self> {
        let exe_dir = Self::exe_dir();

        // Try to load .env from executable's directory first
        if let Some(ref dir) = exe_dir {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        // Fall back to current directory
        dotenvy::dotenv().ok();

        let default_db = exe_dir
            .map(|d| d.join("feedsmith.db").to_string_lossy().into_owned())
            .unwrap_or_else(|| "./feedsmith.db".to_string());

        Self::from_lookup(default_db, |key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(default_db: String, lookup: F) -> FeedsmithResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DeriveOptions::default();

        let db_path = lookup("FEEDSMITH_DB_PATH").unwrap_or(default_db);
        let timeout_secs: u64 = parse_var(&lookup, "FEEDSMITH_TIMEOUT_SECS", 30)?;
        let user_agent =
            lookup("FEEDSMITH_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let concurrency: usize = parse_var(&lookup, "FEEDSMITH_CONCURRENCY", 4)?;

        let derive = DeriveOptions {
            summary_length: parse_var(&lookup, "FEEDSMITH_SUMMARY_LENGTH", defaults.summary_length)?,
            cjk_chars_per_minute: parse_var(
                &lookup,
                "FEEDSMITH_CJK_CHARS_PER_MINUTE",
                defaults.cjk_chars_per_minute,
            )?,
            words_per_minute: parse_var(
                &lookup,
                "FEEDSMITH_WORDS_PER_MINUTE",
                defaults.words_per_minute,
            )?,
            ..defaults
        };

        if timeout_secs == 0 {
            return Err(FeedsmithError::Config(
                "FEEDSMITH_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if concurrency == 0 {
            return Err(FeedsmithError::Config(
                "FEEDSMITH_CONCURRENCY must be greater than zero".to_string(),
            ));
        }
        if derive.cjk_chars_per_minute == 0 || derive.words_per_minute == 0 {
            return Err(FeedsmithError::Config(
                "Reading speeds must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            db_path,
            timeout: Duration::from_secs(timeout_secs),
            user_agent,
            concurrency,
            derive,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> FeedsmithResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            FeedsmithError::Config(format!("{} has an invalid value: {}", key, raw))
        }),
        None => Ok(default),
    }
}
