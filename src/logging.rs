use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_DIRECTIVE: &str = "nba_incremental=info";

/// Console logging to stderr, filtered by `RUST_LOG` when set.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
