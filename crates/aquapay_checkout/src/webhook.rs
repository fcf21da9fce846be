// --- File: crates/aquapay_checkout/src/webhook.rs ---
//! Server-to-server payment notifications.
//!
//! This is the out-of-band reconciliation path: a provider callback can
//! finalize a transaction the browser return left indeterminate. Each
//! provider signs its notifications differently; all verification happens
//! here against secrets from the environment, before any payload is
//! trusted. Replayed notifications are idempotent through the ledger's
//! one-shot finalize.

use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, warn};

use aquapay_common::{HttpStatusCode, OutcomeStatus, ProviderKind, TransactionOutcome};

use crate::ledger::{LedgerError, TransactionLedger, TransactionRecord};

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("webhook signature verification failed")]
    InvalidSignature,

    #[error("webhook secret not configured: {0}")]
    MissingSecret(&'static str),

    #[error("webhook secret unusable for HMAC")]
    InvalidSecret,

    #[error("malformed webhook payload: {0}")]
    InvalidPayload(String),

    #[error("notification references an unknown transaction")]
    UnknownTransaction,

    #[error("unrecognized provider status: {0}")]
    UnknownStatus(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl HttpStatusCode for WebhookError {
    fn status_code(&self) -> u16 {
        match self {
            WebhookError::MissingSignature => 400,
            WebhookError::InvalidSignature => 401,
            WebhookError::MissingSecret(_) => 500,
            WebhookError::InvalidSecret => 500,
            WebhookError::InvalidPayload(_) => 400,
            WebhookError::UnknownTransaction => 404,
            WebhookError::UnknownStatus(_) => 422,
            WebhookError::Ledger(_) => 500,
        }
    }
}

/// The provider-agnostic shape of a payment notification after the
/// provider-specific envelope is peeled off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookEvent {
    /// Our order id (`external_reference`/`custom_id`/`buy_order`).
    pub order_id: Option<String>,
    /// The provider token, for providers that echo it instead.
    pub token: Option<String>,
    pub status: String,
    pub amount: Option<i64>,
    pub authorization_code: Option<String>,
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn hmac_sha256(secret: &str, message: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Environment variable carrying the webhook secret per provider.
/// PayPal uses certificate-based transmission headers instead.
pub fn secret_env_var(provider: ProviderKind) -> Option<&'static str> {
    match provider {
        ProviderKind::Webpay => Some("WEBPAY_WEBHOOK_SECRET"),
        ProviderKind::Mach => Some("MACH_WEBHOOK_SECRET"),
        ProviderKind::MercadoPago => Some("MP_WEBHOOK_SECRET"),
        ProviderKind::Paypal => None,
    }
}

/// Verify a notification signature against the raw request body.
///
/// - Webpay: hex HMAC-SHA256 of the body (`Tbk-Signature`).
/// - Mach: base64 HMAC-SHA256 of the body (`Mach-Signature`).
/// - Mercado Pago: hex HMAC-SHA256 of `"{request_id}.{body}"`
///   (`X-Signature` + `X-Request-Id`).
/// - PayPal: transmission headers must be present; full certificate-chain
///   verification requires the provider SDK and is out of scope here.
pub fn verify_signature(
    provider: ProviderKind,
    body: &[u8],
    signature: Option<&str>,
    request_id: Option<&str>,
    secret: Option<&str>,
) -> Result<(), WebhookError> {
    let signature = signature.ok_or(WebhookError::MissingSignature)?;

    match provider {
        ProviderKind::Webpay => {
            let secret = secret.ok_or(WebhookError::MissingSecret("WEBPAY_WEBHOOK_SECRET"))?;
            let expected = hex::encode(hmac_sha256(secret, body)?);
            if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
                Ok(())
            } else {
                Err(WebhookError::InvalidSignature)
            }
        }
        ProviderKind::Mach => {
            let secret = secret.ok_or(WebhookError::MissingSecret("MACH_WEBHOOK_SECRET"))?;
            let expected = base64_engine.encode(hmac_sha256(secret, body)?);
            if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
                Ok(())
            } else {
                Err(WebhookError::InvalidSignature)
            }
        }
        ProviderKind::MercadoPago => {
            let secret = secret.ok_or(WebhookError::MissingSecret("MP_WEBHOOK_SECRET"))?;
            let request_id = request_id.ok_or(WebhookError::MissingSignature)?;
            let mut signed = request_id.as_bytes().to_vec();
            signed.push(b'.');
            signed.extend_from_slice(body);
            let expected = hex::encode(hmac_sha256(secret, &signed)?);
            if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
                Ok(())
            } else {
                Err(WebhookError::InvalidSignature)
            }
        }
        ProviderKind::Paypal => {
            // Presence check only; see the doc comment.
            if signature.trim().is_empty() {
                Err(WebhookError::MissingSignature)
            } else {
                Ok(())
            }
        }
    }
}

/// Map a provider's notification status to the generic outcome status.
/// Unsettled statuses return `None`: the notification is acknowledged
/// but the transaction is left for a later, settled notification.
pub fn map_notification_status(provider: ProviderKind, status: &str) -> Option<OutcomeStatus> {
    match provider {
        ProviderKind::Webpay => match status {
            "AUTHORIZED" => Some(OutcomeStatus::Authorized),
            "FAILED" | "REJECTED" => Some(OutcomeStatus::Rejected),
            "TIMEOUT" | "EXPIRED" => Some(OutcomeStatus::Timeout),
            _ => None,
        },
        ProviderKind::Mach | ProviderKind::MercadoPago => match status {
            "approved" => Some(OutcomeStatus::Authorized),
            "rejected" | "failed" => Some(OutcomeStatus::Rejected),
            "expired" | "cancelled" => Some(OutcomeStatus::Timeout),
            _ => None,
        },
        ProviderKind::Paypal => match status {
            "COMPLETED" => Some(OutcomeStatus::Authorized),
            "DENIED" | "DECLINED" => Some(OutcomeStatus::Rejected),
            "VOIDED" | "EXPIRED" => Some(OutcomeStatus::Timeout),
            _ => None,
        },
    }
}

/// Apply a verified notification to the ledger.
///
/// Returns the (possibly already-final) transaction record, or `None`
/// when the status is not settled yet and nothing was applied.
pub fn process_notification(
    ledger: &TransactionLedger,
    provider: ProviderKind,
    event: &WebhookEvent,
) -> Result<Option<TransactionRecord>, WebhookError> {
    let record = match (&event.order_id, &event.token) {
        (Some(order_id), _) => ledger
            .get(order_id)
            .map_err(|_| WebhookError::UnknownTransaction)?,
        (None, Some(token)) => ledger
            .find_by_token(token)
            .ok_or(WebhookError::UnknownTransaction)?,
        (None, None) => {
            return Err(WebhookError::InvalidPayload(
                "notification carries neither order_id nor token".to_string(),
            ))
        }
    };

    if record.provider() != provider {
        warn!(order_id = %record.order_id(), expected = %record.provider(), got = %provider,
            "Notification provider mismatch");
        return Err(WebhookError::UnknownTransaction);
    }

    let Some(status) = map_notification_status(provider, &event.status) else {
        info!(order_id = %record.order_id(), status = %event.status,
            "Unsettled notification acknowledged without effect");
        return Ok(None);
    };

    let outcome = TransactionOutcome {
        status,
        amount: event.amount.unwrap_or(record.request.amount),
        authorization_code: event.authorization_code.clone(),
        account_mask: None,
        transaction_date: Utc::now(),
    };

    let finalized = ledger.finalize(record.order_id(), outcome)?;
    info!(order_id = %finalized.order_id(), state = %finalized.state,
        "Notification applied");
    Ok(Some(finalized))
}
