use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

pub const LOG_ENV: &str = "CHANVID_LOG";

/// `CHANVID_LOG` takes precedence; otherwise `info`, or `debug` with `-v`.
pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests) is not an error worth reporting.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
