// --- File: crates/aquapay_providers/src/paypal.rs ---
//! PayPal international wallet adapter.
//!
//! PayPal charges in USD while the checkout currency is CLP. All
//! conversions happen in [`clp_to_usd_value`] and [`usd_value_to_clp`] —
//! the single conversion point the rest of the adapter goes through, using
//! the configured `clp_per_usd` rate and half-up rounding to cents.

use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use aquapay_common::{
    BoxFuture, OutcomeStatus, PaymentInitResult, PaymentProvider, PaymentRequest, ProviderError,
    ProviderKind, RefundResult, TransactionOutcome, HTTP_CLIENT,
};
use aquapay_config::PaypalConfig;

use crate::require_env;

/// Convert an integer CLP amount to a USD decimal string ("8.75").
/// Rounds half-up to the cent.
fn clp_to_usd_value(amount_clp: i64, clp_per_usd: i64) -> String {
    let cents = (amount_clp * 100 + clp_per_usd / 2) / clp_per_usd;
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Convert a USD decimal string back to integer CLP with the same rate,
/// so outcomes are reported in the checkout currency.
fn usd_value_to_clp(value: &str, clp_per_usd: i64) -> Option<i64> {
    let mut parts = value.splitn(2, '.');
    let dollars: i64 = parts.next()?.parse().ok()?;
    let cents_str = parts.next().unwrap_or("0");
    let cents: i64 = format!("{cents_str:0<2}").get(0..2)?.parse().ok()?;
    Some(((dollars * 100 + cents) * clp_per_usd + 50) / 100)
}

#[derive(Deserialize, Debug)]
struct PaypalAuthResponse {
    access_token: String,
}

#[derive(Serialize, Debug)]
struct PaypalAmount {
    currency_code: &'static str,
    value: String,
}

#[derive(Serialize, Debug)]
struct PaypalItem {
    name: String,
    unit_amount: PaypalAmount,
    quantity: String,
}

#[derive(Serialize, Debug)]
struct PaypalPurchaseUnit {
    custom_id: String,
    amount: PaypalAmount,
    items: Vec<PaypalItem>,
}

#[derive(Serialize, Debug)]
struct PaypalApplicationContext<'a> {
    return_url: &'a str,
    cancel_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    brand_name: Option<&'a str>,
    user_action: &'static str,
}

#[derive(Serialize, Debug)]
struct PaypalCreateOrder<'a> {
    intent: &'static str,
    purchase_units: Vec<PaypalPurchaseUnit>,
    application_context: PaypalApplicationContext<'a>,
}

#[derive(Deserialize, Debug)]
struct PaypalLink {
    rel: String,
    href: String,
}

#[derive(Deserialize, Debug)]
struct PaypalOrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<PaypalLink>,
}

#[derive(Deserialize, Debug)]
struct PaypalCaptureAmount {
    value: String,
}

#[derive(Deserialize, Debug)]
struct PaypalCapture {
    id: String,
    status: String,
    amount: Option<PaypalCaptureAmount>,
}

#[derive(Deserialize, Debug)]
struct PaypalPayments {
    #[serde(default)]
    captures: Vec<PaypalCapture>,
}

#[derive(Deserialize, Debug)]
struct PaypalCapturedUnit {
    payments: Option<PaypalPayments>,
}

#[derive(Deserialize, Debug)]
struct PaypalCaptureResponse {
    status: String,
    #[serde(default)]
    purchase_units: Vec<PaypalCapturedUnit>,
}

pub struct PaypalWallet {
    config: PaypalConfig,
    client: Client,
}

impl PaypalWallet {
    pub fn new(config: PaypalConfig) -> Self {
        Self {
            config,
            client: HTTP_CLIENT.clone(),
        }
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        let secret = require_env(self.kind(), "PAYPAL_CLIENT_SECRET")?;
        let basic = base64_engine.encode(format!("{}:{}", self.config.client_id, secret));

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.base_url))
            .header("Authorization", format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                provider: self.kind(),
                status: status.as_u16(),
                message: "oauth token request rejected".to_string(),
            });
        }
        let auth: PaypalAuthResponse = response.json().await.map_err(|e| ProviderError::Parse {
            provider: self.kind(),
            message: e.to_string(),
        })?;
        Ok(auth.access_token)
    }
}

fn map_capture_status(status: &str) -> OutcomeStatus {
    match status {
        "COMPLETED" => OutcomeStatus::Authorized,
        "EXPIRED" | "VOIDED" => OutcomeStatus::Timeout,
        _ => OutcomeStatus::Rejected,
    }
}

impl PaymentProvider for PaypalWallet {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Paypal
    }

    fn max_amount(&self) -> i64 {
        self.config.max_amount
    }

    fn initiate(
        &self,
        request: &PaymentRequest,
    ) -> BoxFuture<'_, PaymentInitResult, ProviderError> {
        let request = request.clone();
        Box::pin(async move {
            let token = self.access_token().await?;
            let rate = self.config.clp_per_usd;

            let items = request
                .cart
                .items
                .iter()
                .map(|item| PaypalItem {
                    name: item.product_id.clone(),
                    unit_amount: PaypalAmount {
                        currency_code: "USD",
                        value: clp_to_usd_value(item.unit_price, rate),
                    },
                    quantity: item.quantity.to_string(),
                })
                .collect();

            let body = PaypalCreateOrder {
                intent: "CAPTURE",
                purchase_units: vec![PaypalPurchaseUnit {
                    custom_id: request.order_id.clone(),
                    amount: PaypalAmount {
                        currency_code: "USD",
                        value: clp_to_usd_value(request.amount, rate),
                    },
                    items,
                }],
                application_context: PaypalApplicationContext {
                    return_url: &self.config.return_url,
                    cancel_url: &self.config.cancel_url,
                    brand_name: self.config.brand_name.as_deref(),
                    user_action: "PAY_NOW",
                },
            };

            info!(order_id = %request.order_id, "Creating PayPal order");
            let response = self
                .client
                .post(format!("{}/v2/checkout/orders", self.config.base_url))
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api {
                    provider: self.kind(),
                    status: status.as_u16(),
                    message: text,
                });
            }

            let order: PaypalOrderResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            let approve = order
                .links
                .iter()
                .find(|link| link.rel == "approve")
                .map(|link| link.href.clone())
                .ok_or_else(|| ProviderError::Parse {
                    provider: self.kind(),
                    message: "order response missing approve link".to_string(),
                })?;

            Ok(PaymentInitResult {
                redirect_url: approve,
                provider_token: order.id,
            })
        })
    }

    fn confirm(&self, token: &str) -> BoxFuture<'_, TransactionOutcome, ProviderError> {
        let token = token.to_string();
        Box::pin(async move {
            let access = self.access_token().await?;
            let response = self
                .client
                .post(format!(
                    "{}/v2/checkout/orders/{}/capture",
                    self.config.base_url, token
                ))
                .bearer_auth(&access)
                .header("Content-Type", "application/json")
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api {
                    provider: self.kind(),
                    status: status.as_u16(),
                    message: text,
                });
            }

            let captured: PaypalCaptureResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            let capture = captured
                .purchase_units
                .first()
                .and_then(|unit| unit.payments.as_ref())
                .and_then(|payments| payments.captures.first());

            let amount = capture
                .and_then(|c| c.amount.as_ref())
                .and_then(|a| usd_value_to_clp(&a.value, self.config.clp_per_usd))
                .unwrap_or(0);

            Ok(TransactionOutcome {
                status: map_capture_status(&captured.status),
                amount,
                authorization_code: capture.map(|c| c.id.clone()),
                account_mask: None,
                transaction_date: Utc::now(),
            })
        })
    }

    fn refund(&self, token: &str, amount: i64) -> BoxFuture<'_, RefundResult, ProviderError> {
        let token = token.to_string();
        Box::pin(async move {
            let access = self.access_token().await?;
            // The capture id is needed for a refund; re-read the order.
            let response = self
                .client
                .get(format!(
                    "{}/v2/checkout/orders/{}",
                    self.config.base_url, token
                ))
                .bearer_auth(&access)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

            let order: PaypalCaptureResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            let capture_id = order
                .purchase_units
                .first()
                .and_then(|unit| unit.payments.as_ref())
                .and_then(|payments| payments.captures.first())
                .map(|c| c.id.clone())
                .ok_or(ProviderError::RefundUnsupported {
                    provider: self.kind(),
                })?;

            let body = serde_json::json!({
                "amount": {
                    "currency_code": "USD",
                    "value": clp_to_usd_value(amount, self.config.clp_per_usd),
                }
            });
            let response = self
                .client
                .post(format!(
                    "{}/v2/payments/captures/{}/refund",
                    self.config.base_url, capture_id
                ))
                .bearer_auth(&access)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

            let status = response.status();
            if status.as_u16() == 422 {
                return Err(ProviderError::InsufficientBalance {
                    provider: self.kind(),
                });
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api {
                    provider: self.kind(),
                    status: status.as_u16(),
                    message: text,
                });
            }

            Ok(RefundResult {
                provider: ProviderKind::Paypal,
                status: "REFUNDED".to_string(),
                nullified_amount: amount,
                authorization_code: Some(capture_id),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clp_converts_to_usd_cents_half_up() {
        // 7000 CLP at 800 CLP/USD is exactly 8.75 USD.
        assert_eq!(clp_to_usd_value(7000, 800), "8.75");
        // 999 CLP at 800 is 1.24875 -> rounds to 1.25.
        assert_eq!(clp_to_usd_value(999, 800), "1.25");
        assert_eq!(clp_to_usd_value(1, 800), "0.00");
    }

    #[test]
    fn usd_round_trips_back_to_clp() {
        assert_eq!(usd_value_to_clp("8.75", 800), Some(7000));
        assert_eq!(usd_value_to_clp("1.25", 800), Some(1000));
        assert_eq!(usd_value_to_clp("10", 800), Some(8000));
        assert_eq!(usd_value_to_clp("not-a-number", 800), None);
    }

    #[test]
    fn capture_status_mapping() {
        assert_eq!(map_capture_status("COMPLETED"), OutcomeStatus::Authorized);
        assert_eq!(map_capture_status("DECLINED"), OutcomeStatus::Rejected);
        assert_eq!(map_capture_status("VOIDED"), OutcomeStatus::Timeout);
    }
}
