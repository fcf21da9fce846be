// --- File: crates/aquapay_common/src/logging.rs ---
//! Logging utilities for the Aquapay services.
//!
//! Provides a standardized tracing setup used by the backend binary and by
//! tests that want log output.

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber with the default level (INFO).
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific minimum log level.
///
/// `RUST_LOG` still takes precedence through the `EnvFilter`. Uses
/// `try_init` so repeated calls (e.g. from multiple tests) are harmless.
pub fn init_with_level(level: Level) {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("aquapay={level}").parse().expect("valid directive"));

    let result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}
