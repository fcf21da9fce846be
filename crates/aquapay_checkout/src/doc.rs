// --- File: crates/aquapay_checkout/src/doc.rs ---
#![allow(dead_code)]
#![cfg(feature = "openapi")]
use utoipa::OpenApi;

use aquapay_common::RefundResult;

use crate::handlers::{RefundRequest, StartCheckoutRequest, TransactionStatusResponse};
use crate::logic::CheckoutRedirect;
use crate::reconciler::{ReceiptView, ReturnResult, ReturnStatus};
use crate::webhook::WebhookEvent;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::start_checkout_handler,
        crate::handlers::payment_return_handler,
        crate::handlers::webhook_handler,
        crate::handlers::transaction_status_handler,
        crate::handlers::refund_handler,
    ),
    components(schemas(
        StartCheckoutRequest,
        CheckoutRedirect,
        ReturnResult,
        ReturnStatus,
        ReceiptView,
        WebhookEvent,
        TransactionStatusResponse,
        RefundRequest,
        RefundResult,
    )),
    tags(
        (name = "Checkout", description = "Checkout, return, status and refund endpoints"),
        (name = "Checkout Webhooks", description = "Server-to-server payment notifications")
    )
)]
pub struct CheckoutApiDoc;
