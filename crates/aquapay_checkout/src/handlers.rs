// --- File: crates/aquapay_checkout/src/handlers.rs ---
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::error;

use aquapay_common::{
    CartSnapshot, Customer, HttpStatusCode, ProviderKind, RefundResult,
};
use aquapay_config::AppConfig;

use crate::ledger::TransactionLedger;
use crate::logic::{CheckoutError, CheckoutRedirect, CheckoutService};
use crate::reconciler::{ReturnReconciler, ReturnResult};
use crate::webhook::{
    process_notification, secret_env_var, verify_signature, WebhookError, WebhookEvent,
};

/// Shared state for all checkout handlers.
#[derive(Clone)]
pub struct CheckoutState {
    pub config: Arc<AppConfig>,
    pub service: Arc<CheckoutService>,
    pub reconciler: Arc<ReturnReconciler>,
    pub ledger: Arc<TransactionLedger>,
}

fn error_response<E: HttpStatusCode + std::fmt::Display>(err: E) -> (StatusCode, String) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string())
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StartCheckoutRequest {
    pub cart: CartSnapshot,
    pub customer: Customer,
    /// One of "webpay", "mach", "paypal", "mercadopago".
    pub provider: String,
}

/// Axum handler to start a checkout and obtain the provider redirect.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/checkout/start", // Path relative to /api
    request_body = StartCheckoutRequest,
    responses(
        (status = 200, description = "Checkout initiated, redirect ready", body = CheckoutRedirect),
        (status = 400, description = "Unknown or disabled provider"),
        (status = 401, description = "Customer not authenticated"),
        (status = 422, description = "Invalid cart or amount above provider maximum"),
        (status = 429, description = "Too many checkout attempts"),
        (status = 502, description = "Provider initiation failed")
    ),
    tag = "Checkout"
))]
pub async fn start_checkout_handler(
    State(state): State<Arc<CheckoutState>>,
    Json(payload): Json<StartCheckoutRequest>,
) -> Result<Json<CheckoutRedirect>, (StatusCode, String)> {
    let provider = ProviderKind::from_str(&payload.provider)
        .map_err(|_| error_response(CheckoutError::InvalidProvider(payload.provider.clone())))?;

    let redirect = state
        .service
        .start_checkout(payload.cart, payload.customer, provider)
        .await
        .map_err(error_response)?;

    Ok(Json(redirect))
}

/// Axum handler for the browser return from a provider's hosted page.
///
/// The token parameter name is adapter-specific (`token_ws` for the bank
/// gateway, `token` elsewhere), so the query is matched against the
/// parameter names the enabled adapters advertise.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/checkout/return", // Path relative to /api
    params(
        ("token_ws" = Option<String>, Query, description = "Webpay return token"),
        ("token" = Option<String>, Query, description = "Generic return token")
    ),
    responses(
        (status = 200, description = "Return reconciled", body = ReturnResult),
        (status = 400, description = "No token in the return payload"),
        (status = 404, description = "Token does not match any transaction"),
        (status = 429, description = "Token confirmation replayed too fast")
    ),
    tag = "Checkout"
))]
pub async fn payment_return_handler(
    State(state): State<Arc<CheckoutState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ReturnResult>, (StatusCode, String)> {
    let token = state
        .reconciler
        .return_token_params()
        .into_iter()
        .find_map(|name| query.get(name).cloned());
    let result = state
        .reconciler
        .reconcile_return(token.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(result))
}

/// Axum handler for server-to-server payment notifications.
///
/// Takes the raw body so the signature can be verified over the exact
/// bytes the provider signed.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/checkout/webhook/{provider}", // Path relative to /api
    params(("provider" = String, Path, description = "Notifying provider")),
    responses(
        (status = 200, description = "Notification verified and applied"),
        (status = 400, description = "Unknown provider, missing signature, or bad payload"),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "Notification references an unknown transaction")
    ),
    tag = "Checkout Webhooks"
))]
pub async fn webhook_handler(
    State(state): State<Arc<CheckoutState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, (StatusCode, String)> {
    let provider = ProviderKind::from_str(&provider)
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("unknown provider: {provider}")))?;

    let header_name = match provider {
        ProviderKind::Webpay => "Tbk-Signature",
        ProviderKind::Mach => "Mach-Signature",
        ProviderKind::MercadoPago => "X-Signature",
        ProviderKind::Paypal => "Paypal-Transmission-Sig",
    };
    let signature = headers.get(header_name).and_then(|h| h.to_str().ok());
    let request_id = headers.get("X-Request-Id").and_then(|h| h.to_str().ok());

    let secret = match secret_env_var(provider) {
        Some(var) => match std::env::var(var) {
            Ok(s) => Some(s),
            Err(_) => {
                error!(provider = %provider, var, "Webhook secret not set");
                return Err(error_response(WebhookError::MissingSecret(var)));
            }
        },
        None => None,
    };

    verify_signature(
        provider,
        body.as_bytes(),
        signature,
        request_id,
        secret.as_deref(),
    )
    .map_err(error_response)?;

    let event: WebhookEvent = serde_json::from_str(&body)
        .map_err(|e| error_response(WebhookError::InvalidPayload(e.to_string())))?;

    process_notification(&state.ledger, provider, &event).map_err(error_response)?;
    Ok(StatusCode::OK)
}

/// Axum handler reporting a transaction's current ledger state.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/checkout/status/{order_id}", // Path relative to /api
    params(("order_id" = String, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Transaction status", body = TransactionStatusResponse),
        (status = 404, description = "No transaction for this order")
    ),
    tag = "Checkout"
))]
pub async fn transaction_status_handler(
    State(state): State<Arc<CheckoutState>>,
    Path(order_id): Path<String>,
) -> Result<Json<TransactionStatusResponse>, (StatusCode, String)> {
    let record = state.ledger.get(&order_id).map_err(error_response)?;
    Ok(Json(TransactionStatusResponse {
        order_id: record.order_id().to_string(),
        provider: record.provider().to_string(),
        state: record.state.to_string(),
        amount: record.request.amount,
        currency: record.request.currency.clone(),
        finalized_at: record.finalized_at.map(|t| t.to_rfc3339()),
    }))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TransactionStatusResponse {
    pub order_id: String,
    pub provider: String,
    pub state: String,
    pub amount: i64,
    pub currency: String,
    pub finalized_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RefundRequest {
    pub order_id: String,
    pub amount: i64,
}

/// Axum handler to refund part or all of a confirmed transaction.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/checkout/refund", // Path relative to /api
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refund executed by the provider", body = RefundResult),
        (status = 404, description = "No transaction for this order"),
        (status = 409, description = "Transaction is not in a refundable state"),
        (status = 422, description = "Refund amount exceeds the charge")
    ),
    tag = "Checkout"
))]
pub async fn refund_handler(
    State(state): State<Arc<CheckoutState>>,
    Json(payload): Json<RefundRequest>,
) -> Result<Json<RefundResult>, (StatusCode, String)> {
    let result = state
        .service
        .refund(&payload.order_id, payload.amount)
        .await
        .map_err(error_response)?;
    Ok(Json(result))
}
