// --- File: crates/aquapay_providers/src/mercadopago.rs ---
//! Mercado Pago aggregator adapter.
//!
//! Creates a checkout preference whose `init_point` is the redirect URL
//! and whose id is the correlation token; confirmation searches the
//! payments behind the preference. This integration does not expose
//! refunds.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use aquapay_common::{
    mask_account, BoxFuture, OutcomeStatus, PaymentInitResult, PaymentProvider, PaymentRequest,
    ProviderError, ProviderKind, RefundResult, TransactionOutcome, HTTP_CLIENT,
};
use aquapay_config::MercadoPagoConfig;

use crate::require_env;

#[derive(Serialize, Debug)]
struct PreferenceItem {
    title: String,
    quantity: u32,
    unit_price: i64,
    currency_id: String,
}

#[derive(Serialize, Debug)]
struct PreferencePayer<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize, Debug)]
struct PreferenceBackUrls<'a> {
    success: &'a str,
    failure: &'a str,
    pending: &'a str,
}

#[derive(Serialize, Debug)]
struct CreatePreferenceRequest<'a> {
    items: Vec<PreferenceItem>,
    payer: PreferencePayer<'a>,
    back_urls: PreferenceBackUrls<'a>,
    auto_return: &'static str,
    notification_url: &'a str,
    external_reference: &'a str,
}

#[derive(Deserialize, Debug)]
struct CreatePreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Deserialize, Debug)]
struct MpCard {
    last_four_digits: Option<String>,
}

#[derive(Deserialize, Debug)]
struct MpPayment {
    id: i64,
    status: String,
    transaction_amount: i64,
    date_approved: Option<DateTime<Utc>>,
    card: Option<MpCard>,
}

#[derive(Deserialize, Debug)]
struct MpPaymentSearch {
    #[serde(default)]
    results: Vec<MpPayment>,
}

pub struct MercadoPagoGateway {
    config: MercadoPagoConfig,
    client: Client,
}

impl MercadoPagoGateway {
    pub fn new(config: MercadoPagoConfig) -> Self {
        Self {
            config,
            client: HTTP_CLIENT.clone(),
        }
    }
}

/// Aggregator status mapping. `pending`/`in_process` stay unmapped so the
/// reconciler reports them indeterminate and the notification webhook
/// finalizes later.
fn map_status(status: &str) -> Option<OutcomeStatus> {
    match status {
        "approved" => Some(OutcomeStatus::Authorized),
        "rejected" => Some(OutcomeStatus::Rejected),
        "cancelled" | "expired" => Some(OutcomeStatus::Timeout),
        _ => None,
    }
}

impl PaymentProvider for MercadoPagoGateway {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MercadoPago
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
            let access_token = require_env(self.kind(), "MP_ACCESS_TOKEN")?;

            let items = request
                .cart
                .items
                .iter()
                .map(|item| PreferenceItem {
                    title: item.product_id.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    currency_id: request.currency.clone(),
                })
                .collect();

            let body = CreatePreferenceRequest {
                items,
                payer: PreferencePayer {
                    name: &request.customer.name,
                    email: &request.customer.email,
                },
                back_urls: PreferenceBackUrls {
                    success: &self.config.success_url,
                    failure: &self.config.failure_url,
                    pending: &self.config.pending_url,
                },
                auto_return: "approved",
                notification_url: &self.config.notification_url,
                external_reference: &request.order_id,
            };

            info!(order_id = %request.order_id, "Creating Mercado Pago preference");
            let response = self
                .client
                .post(format!("{}/checkout/preferences", self.config.base_url))
                .bearer_auth(&access_token)
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

            let created: CreatePreferenceResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            Ok(PaymentInitResult {
                redirect_url: created.init_point,
                provider_token: created.id,
            })
        })
    }

    fn confirm(&self, token: &str) -> BoxFuture<'_, TransactionOutcome, ProviderError> {
        let token = token.to_string();
        Box::pin(async move {
            let access_token = require_env(self.kind(), "MP_ACCESS_TOKEN")?;
            let response = self
                .client
                .get(format!("{}/v1/payments/search", self.config.base_url))
                .query(&[
                    ("preference_id", token.as_str()),
                    ("sort", "date_created"),
                    ("criteria", "desc"),
                ])
                .bearer_auth(&access_token)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Api {
                    provider: self.kind(),
                    status: status.as_u16(),
                    message: "payment search failed".to_string(),
                });
            }

            let search: MpPaymentSearch =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            let payment = search.results.first().ok_or_else(|| ProviderError::Api {
                provider: self.kind(),
                status: 202,
                message: "no payment recorded for preference yet".to_string(),
            })?;

            let outcome_status =
                map_status(&payment.status).ok_or_else(|| ProviderError::Api {
                    provider: self.kind(),
                    status: 202,
                    message: format!("payment not settled yet: {}", payment.status),
                })?;

            Ok(TransactionOutcome {
                status: outcome_status,
                amount: payment.transaction_amount,
                authorization_code: Some(payment.id.to_string()),
                account_mask: payment
                    .card
                    .as_ref()
                    .and_then(|card| card.last_four_digits.as_deref())
                    .map(mask_account),
                transaction_date: payment.date_approved.unwrap_or_else(Utc::now),
            })
        })
    }

    fn refund(&self, _token: &str, _amount: i64) -> BoxFuture<'_, RefundResult, ProviderError> {
        Box::pin(async move {
            Err(ProviderError::RefundUnsupported {
                provider: ProviderKind::MercadoPago,
            })
        })
    }
}
