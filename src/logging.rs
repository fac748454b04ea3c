use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "FEEDSMITH_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Diagnostics go to stderr so command output on stdout stays clean.
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
