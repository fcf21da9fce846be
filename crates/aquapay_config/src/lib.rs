// --- File: crates/aquapay_config/src/lib.rs ---
//! Configuration loading for the Aquapay services.
//!
//! Non-secret settings are layered from an optional TOML file
//! (`config/default`, overridable via the `AQUAPAY_CONFIG` env var) and
//! `APP_`-prefixed environment variables (`APP_SERVER__PORT=9000`).
//! Secrets (provider API keys, webhook secrets) are never part of this
//! tree; adapters read them from plain environment variables at call time.

use config::{Config, ConfigError, Environment, File};
use std::sync::Once;

pub mod models;
pub use models::*;

static DOTENV_INIT: Once = Once::new();

/// Load `.env` once per process; later calls are no-ops.
pub fn ensure_dotenv_loaded() {
    DOTENV_INIT.call_once(|| {
        if dotenv::dotenv().is_ok() {
            tracing::debug!("Loaded environment from .env");
        }
    });
}

/// Load the application configuration.
///
/// Missing config files are fine; every section has serde defaults, so an
/// empty environment yields a runnable (all providers disabled) config.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();
    let path =
        std::env::var("AQUAPAY_CONFIG").unwrap_or_else(|_| "config/default".to_string());

    let settings = Config::builder()
        .add_source(File::with_name(&path).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    settings.try_deserialize()
}
