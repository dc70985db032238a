//! Logging infrastructure for Spotter.
//!
//! Tracing output goes to stderr so command output on stdout stays clean.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when neither RUST_LOG nor `--verbose` is given
pub const DEFAULT_LEVEL: &str = "warn";

/// Initialize logging for the CLI's verbosity flag
pub fn init_for_verbosity(verbose: bool) {
    init_with_level(if verbose { "debug" } else { DEFAULT_LEVEL })
}

/// Initialize logging with a specific default level
///
/// RUST_LOG still takes precedence when set.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
