// --- File: crates/aquapay_common/src/services.rs ---
//! Provider service abstraction.
//!
//! Every third-party payment provider is modeled as a [`PaymentProvider`]
//! implementation. The trait is object safe so the registry can hold
//! heterogeneous adapters behind `Arc<dyn PaymentProvider>`; adapters are
//! stateless and must be safe to call concurrently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{PaymentRequest, ProviderKind};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Errors a provider adapter can surface.
///
/// Business declines are NOT errors; they come back as a
/// [`TransactionOutcome`] with a rejected status. These variants cover
/// transport, configuration, and protocol failures only.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport failure or timeout reaching the provider.
    #[error("{provider} unavailable: {message}")]
    Unavailable {
        provider: ProviderKind,
        message: String,
    },

    /// The provider answered with a protocol-level error.
    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    /// The provider response could not be parsed.
    #[error("failed to parse {provider} response: {message}")]
    Parse {
        provider: ProviderKind,
        message: String,
    },

    /// Credentials for the provider are missing from the environment.
    #[error("missing credentials for {provider}: {name}")]
    MissingCredentials {
        provider: ProviderKind,
        name: &'static str,
    },

    /// The provider integration does not support refunds.
    #[error("{provider} does not support refunds")]
    RefundUnsupported { provider: ProviderKind },

    /// The refundable balance is lower than the requested amount.
    #[error("insufficient refundable balance on {provider}")]
    InsufficientBalance { provider: ProviderKind },
}

impl ProviderError {
    /// Transport-level failures, where the provider may or may not have
    /// seen the request. During confirmation these must never be reported
    /// as a clean payment failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable { .. } | ProviderError::MissingCredentials { .. }
        )
    }

    pub fn from_reqwest(provider: ProviderKind, err: reqwest::Error) -> Self {
        ProviderError::Unavailable {
            provider,
            message: if err.is_timeout() {
                format!("request timed out: {err}")
            } else {
                err.to_string()
            },
        }
    }
}

impl crate::error::HttpStatusCode for ProviderError {
    fn status_code(&self) -> u16 {
        match self {
            ProviderError::Unavailable { .. } => 502,
            ProviderError::Api { .. } => 502,
            ProviderError::Parse { .. } => 502,
            ProviderError::MissingCredentials { .. } => 500,
            ProviderError::RefundUnsupported { .. } => 400,
            ProviderError::InsufficientBalance { .. } => 409,
        }
    }
}

/// Result of initiating a transaction with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitResult {
    /// The URL the caller must navigate the user to.
    pub redirect_url: String,
    /// The provider-issued correlation token for the transaction.
    pub provider_token: String,
}

/// The provider's verdict for a confirmed transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Authorized,
    Rejected,
    Timeout,
}

/// The generic confirmation payload an adapter distills out of a
/// provider-specific response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub status: OutcomeStatus,
    /// Amount as reported by the provider, in the checkout currency's
    /// minor unit (adapters convert back if they charged in another unit).
    pub amount: i64,
    pub authorization_code: Option<String>,
    /// Masked account/card identifier, if the provider reported one.
    pub account_mask: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

/// Result of a refund operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RefundResult {
    pub provider: ProviderKind,
    pub status: String,
    pub nullified_amount: i64,
    pub authorization_code: Option<String>,
}

/// A payment provider adapter.
///
/// Adapters translate the generic [`PaymentRequest`] into provider wire
/// calls and provider responses back into [`TransactionOutcome`]s. They
/// hold no transaction state; idempotency of effects is the ledger's job.
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// The largest amount this provider accepts, in the checkout
    /// currency's minor unit.
    fn max_amount(&self) -> i64;

    /// Query parameter carrying the correlation token on the return
    /// redirect (`token_ws` for the bank gateway, `token` elsewhere).
    fn return_token_param(&self) -> &'static str {
        "token"
    }

    /// Create a transaction and obtain a redirect URL.
    ///
    /// Only transport/config failures error here; business declines are
    /// discovered at confirm time for redirect-based flows.
    fn initiate(&self, request: &PaymentRequest)
        -> BoxFuture<'_, PaymentInitResult, ProviderError>;

    /// Confirm (or re-query) the transaction behind a token. Safe to call
    /// more than once for the same token.
    fn confirm(&self, token: &str) -> BoxFuture<'_, TransactionOutcome, ProviderError>;

    /// Refund part or all of a captured transaction.
    fn refund(&self, token: &str, amount: i64) -> BoxFuture<'_, RefundResult, ProviderError>;
}

/// Runtime registry of the enabled provider adapters.
///
/// Built once at startup and shared; the orchestrator selects an adapter
/// exactly once per checkout and never branches on the provider again.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn enabled_kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
