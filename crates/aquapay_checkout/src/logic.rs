// --- File: crates/aquapay_checkout/src/logic.rs ---
//! The checkout orchestrator.
//!
//! Selects the provider adapter exactly once per checkout, recomputes the
//! amount server-side, opens the ledger row, and turns the adapter's init
//! result into a redirect instruction. The core never retries a provider
//! call; a retry is a caller decision and a genuinely new attempt gets a
//! new order id.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use aquapay_common::{
    AquapayError, CartSnapshot, Customer, HttpStatusCode, PaymentRequest, ProviderError,
    ProviderKind, ProviderRegistry, RefundResult,
};
use aquapay_config::CheckoutConfig;

use crate::guard::SlidingWindowGuard;
use crate::ledger::{LedgerError, TransactionLedger, TransactionState};

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid cart: {0}")]
    InvalidCart(String),

    #[error("checkout requires an authenticated customer")]
    UnauthenticatedCustomer,

    #[error("invalid or disabled payment provider: {0}")]
    InvalidProvider(String),

    #[error("too many checkout attempts, try again later")]
    RateLimited,

    #[error("amount {amount} exceeds the provider maximum of {max}")]
    AmountTooLarge { amount: i64, max: i64 },

    #[error("a transaction already exists for order {0}")]
    DuplicateOrderId(String),

    /// Initiation failed before any charge could occur; the caller may
    /// safely let the user retry checkout.
    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Bug-class ledger failure (an orderId that should exist does not,
    /// or a transition the orchestrator never issues).
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateOrderId(order_id) => CheckoutError::DuplicateOrderId(order_id),
            other => CheckoutError::Ledger(other),
        }
    }
}

impl HttpStatusCode for CheckoutError {
    fn status_code(&self) -> u16 {
        match self {
            CheckoutError::EmptyCart | CheckoutError::InvalidCart(_) => 422,
            CheckoutError::UnauthenticatedCustomer => 401,
            CheckoutError::InvalidProvider(_) => 400,
            CheckoutError::RateLimited => 429,
            CheckoutError::AmountTooLarge { .. } => 422,
            CheckoutError::DuplicateOrderId(_) => 409,
            CheckoutError::ProviderUnavailable(_) => 502,
            CheckoutError::Ledger(_) => 500,
        }
    }
}

impl From<CheckoutError> for AquapayError {
    fn from(err: CheckoutError) -> Self {
        match &err {
            CheckoutError::ProviderUnavailable(msg) => AquapayError::ExternalServiceError {
                service_name: "payment provider".to_string(),
                message: msg.clone(),
            },
            CheckoutError::RateLimited => AquapayError::RateLimitError(err.to_string()),
            CheckoutError::DuplicateOrderId(_) => AquapayError::ConflictError(err.to_string()),
            CheckoutError::UnauthenticatedCustomer => AquapayError::AuthError(err.to_string()),
            CheckoutError::Ledger(_) => AquapayError::InternalError(err.to_string()),
            _ => AquapayError::ValidationError(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum RefundError {
    #[error("no transaction for order {0}")]
    NotFound(String),

    #[error("order {order_id} is not refundable in state {state}")]
    NotRefundable {
        order_id: String,
        state: TransactionState,
    },

    #[error("refund of {requested} exceeds the charged amount {charged}")]
    AmountExceedsCharge { requested: i64, charged: i64 },

    #[error("provider for order is no longer enabled: {0}")]
    ProviderDisabled(ProviderKind),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl HttpStatusCode for RefundError {
    fn status_code(&self) -> u16 {
        match self {
            RefundError::NotFound(_) => 404,
            RefundError::NotRefundable { .. } => 409,
            RefundError::AmountExceedsCharge { .. } => 422,
            RefundError::ProviderDisabled(_) => 503,
            RefundError::Provider(e) => e.status_code(),
        }
    }
}

/// The redirect instruction returned to the storefront. The core does not
/// perform the navigation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CheckoutRedirect {
    pub order_id: String,
    pub redirect_url: String,
}

/// Orchestrates checkout against the ledger, the guard, and the adapters.
pub struct CheckoutService {
    config: CheckoutConfig,
    registry: Arc<ProviderRegistry>,
    ledger: Arc<TransactionLedger>,
    guard: Arc<SlidingWindowGuard>,
}

impl CheckoutService {
    pub fn new(
        config: CheckoutConfig,
        registry: Arc<ProviderRegistry>,
        ledger: Arc<TransactionLedger>,
        guard: Arc<SlidingWindowGuard>,
    ) -> Self {
        Self {
            config,
            registry,
            ledger,
            guard,
        }
    }

    /// Start a checkout: validate, throttle, open a ledger row, initiate
    /// with the chosen provider, and return the redirect instruction.
    pub async fn start_checkout(
        &self,
        cart: CartSnapshot,
        customer: Customer,
        provider: ProviderKind,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        cart.validate().map_err(CheckoutError::InvalidCart)?;

        if !customer.is_authenticated() {
            return Err(CheckoutError::UnauthenticatedCustomer);
        }

        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| CheckoutError::InvalidProvider(provider.to_string()))?;

        if !self
            .guard
            .check_and_record(&customer.id, self.config.checkout_rate_limit)
        {
            warn!(customer_id = %customer.id, "Checkout attempt rate limited");
            return Err(CheckoutError::RateLimited);
        }

        // The amount is always recomputed from the cart; a caller-supplied
        // total is never part of the request surface.
        let amount = match cart.total() {
            Some(amount) if amount > 0 => amount,
            _ => {
                return Err(CheckoutError::InvalidCart(
                    "cart total is outside the chargeable range".to_string(),
                ))
            }
        };
        let max = adapter.max_amount();
        if amount > max {
            return Err(CheckoutError::AmountTooLarge { amount, max });
        }

        let order_id = format!("ORD-{}", Uuid::new_v4().simple());
        let request = PaymentRequest {
            order_id: order_id.clone(),
            amount,
            currency: self.config.currency.clone(),
            provider,
            customer,
            cart,
            created_at: chrono::Utc::now(),
        };

        self.ledger.open(&request)?;

        let init = match adapter.initiate(&request).await {
            Ok(init) => init,
            Err(e) => {
                // The row stays OPEN: no charge can have occurred, and the
                // stale sweep will expire it if the caller walks away.
                warn!(order_id = %order_id, provider = %provider, "Initiation failed: {e}");
                return Err(CheckoutError::ProviderUnavailable(e.to_string()));
            }
        };

        self.ledger
            .mark_initiated(&order_id, &init.provider_token)?;

        info!(order_id = %order_id, provider = %provider, amount, "Checkout initiated");
        Ok(CheckoutRedirect {
            order_id,
            redirect_url: init.redirect_url,
        })
    }

    /// Refund part or all of a confirmed transaction through its provider.
    pub async fn refund(&self, order_id: &str, amount: i64) -> Result<RefundResult, RefundError> {
        let record = self
            .ledger
            .get(order_id)
            .map_err(|_| RefundError::NotFound(order_id.to_string()))?;

        if record.state != TransactionState::Confirmed {
            return Err(RefundError::NotRefundable {
                order_id: order_id.to_string(),
                state: record.state,
            });
        }
        let charged = record.request.amount;
        if amount <= 0 || amount > charged {
            return Err(RefundError::AmountExceedsCharge {
                requested: amount,
                charged,
            });
        }

        let token = record.provider_token.as_deref().ok_or_else(|| {
            // Confirmed without a token cannot happen through this API.
            error!(order_id, "Confirmed transaction has no provider token");
            RefundError::NotRefundable {
                order_id: order_id.to_string(),
                state: record.state,
            }
        })?;

        let adapter = self
            .registry
            .get(record.provider())
            .ok_or(RefundError::ProviderDisabled(record.provider()))?;

        let result = adapter.refund(token, amount).await?;
        info!(order_id, amount, "Refund executed");
        Ok(result)
    }
}
