// --- File: crates/aquapay_common/src/models.rs ---
//! Domain data structures shared by the checkout core and the provider
//! adapters.
//!
//! Amounts are always integers in the minor unit of the checkout currency
//! (CLP has no minor unit, so 1 == 1 peso). Conversions to other units are
//! the business of individual adapters, never of these models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// A single line item of a captured cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CartItem {
    #[cfg_attr(feature = "openapi", schema(example = "1"))]
    pub product_id: String,
    /// Unit price in the minor currency unit.
    #[cfg_attr(feature = "openapi", schema(example = 3500))]
    pub unit_price: i64,
    #[cfg_attr(feature = "openapi", schema(example = 2))]
    pub quantity: u32,
}

/// An immutable snapshot of the cart at checkout time.
///
/// The snapshot never carries a caller-supplied total; the total is always
/// recomputed with [`CartSnapshot::total`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
}

impl CartSnapshot {
    pub fn new(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Recompute the cart total from the line items.
    ///
    /// Returns `None` when a line or the running sum overflows `i64`; a
    /// total that cannot be represented is never a chargeable amount.
    pub fn total(&self) -> Option<i64> {
        self.items.iter().try_fold(0i64, |sum, item| {
            item.unit_price
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| sum.checked_add(line))
        })
    }

    /// Validate the snapshot for checkout: no empty cart, no zero-quantity
    /// or non-positive-price lines.
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("cart has no items".to_string());
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(format!("item {} has zero quantity", item.product_id));
            }
            if item.unit_price <= 0 {
                return Err(format!(
                    "item {} has a non-positive unit price",
                    item.product_id
                ));
            }
        }
        Ok(())
    }
}

/// The authenticated customer placing the order.
///
/// Identity management is external; this is the contact/address record the
/// checkout core receives by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub region: String,
}

impl Customer {
    /// Checkout requires an authenticated identity with usable contact data.
    pub fn is_authenticated(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

/// The payment providers the orchestrator can route to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum ProviderKind {
    /// Local bank gateway (Webpay Plus style, redirect + token_ws return).
    Webpay,
    /// Local mobile wallet.
    Mach,
    /// International wallet, charges in USD.
    Paypal,
    /// Regional payment aggregator.
    MercadoPago,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Webpay => "webpay",
            ProviderKind::Mach => "mach",
            ProviderKind::Paypal => "paypal",
            ProviderKind::MercadoPago => "mercadopago",
        }
    }

    pub fn all() -> [ProviderKind; 4] {
        [
            ProviderKind::Webpay,
            ProviderKind::Mach,
            ProviderKind::Paypal,
            ProviderKind::MercadoPago,
        ]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    /// Accepts the method ids the storefront sends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webpay" => Ok(ProviderKind::Webpay),
            "mach" => Ok(ProviderKind::Mach),
            "paypal" => Ok(ProviderKind::Paypal),
            "mercadopago" | "mercado_pago" => Ok(ProviderKind::MercadoPago),
            other => Err(format!("unknown payment provider: {other}")),
        }
    }
}

/// The generic transaction request handed to a provider adapter.
///
/// `amount` is always recomputed from `cart` by the orchestrator before this
/// struct is built; a caller-supplied total is never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount: i64,
    #[cfg_attr(feature = "openapi", schema(example = "CLP"))]
    pub currency: String,
    pub provider: ProviderKind,
    pub customer: Customer,
    pub cart: CartSnapshot,
    pub created_at: DateTime<Utc>,
}

/// Mask an account or card identifier down to its last 4 digits.
///
/// Receipts must never expose more than the last 4 digits, whatever shape
/// the adapter returned (`************6623`, `4051 8856 0044 6623`, ...).
pub fn mask_account(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return "****".to_string();
    }
    let last4: String = digits[digits.len() - 4..].iter().collect();
    format!("****{last4}")
}
