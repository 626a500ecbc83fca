//! JSON log output for the sync service.
//!
//! Directives come from `AppConfig::log_filter`, which already reflects
//! `RUST_LOG`, so the environment is not consulted again here.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Parse filter directives such as `info,crmsync=debug`.
pub fn build_filter(directives: &str) -> Result<EnvFilter, ParseError> {
    EnvFilter::try_new(directives)
}

/// Install the global subscriber: flattened JSON events with source location.
///
/// Fails on malformed directives. Panics if a global subscriber is already set.
pub fn init_logging(directives: &str) -> Result<(), ParseError> {
    let filter = build_filter(directives)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .flatten_event(true),
        )
        .with(filter)
        .init();

    tracing::info!(
        service = env!("CARGO_PKG_NAME"),
        filter = directives,
        "Logging initialized"
    );
    Ok(())
}

/// Plain-text subscriber for unit tests; later calls are no-ops.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("crmsync=debug,sync_api=debug")
        .try_init();
}
