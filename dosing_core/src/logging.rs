//! Logging infrastructure for dosecalc.
//!
//! The library only emits `tracing` events; binaries install the subscriber.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter for the CLI: quiet unless `verbose`
///
/// Dose output goes to stdout, so diagnostics stay on stderr at `warn`.
/// Verbose mode shows override, floor and cap decisions made by the engine.
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "dosing_core=debug,info"
    } else {
        "warn"
    }
}

/// Install the stderr subscriber
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init(default_level: &str) {
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
