// --- File: crates/aquapay_checkout/src/routes.rs ---

use crate::handlers::{
    payment_return_handler, refund_handler, start_checkout_handler, transaction_status_handler,
    webhook_handler, CheckoutState,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Creates a router containing all routes for the checkout feature.
pub fn routes(state: Arc<CheckoutState>) -> Router {
    Router::new()
        .route("/checkout/start", post(start_checkout_handler))
        // User-facing return endpoint hit after the provider redirect (GET)
        .route("/checkout/return", get(payment_return_handler))
        .route("/checkout/webhook/{provider}", post(webhook_handler))
        .route("/checkout/status/{order_id}", get(transaction_status_handler))
        .route("/checkout/refund", post(refund_handler))
        .with_state(state)
}
