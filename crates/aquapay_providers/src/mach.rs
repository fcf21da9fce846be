// --- File: crates/aquapay_providers/src/mach.rs ---
//! Mach mobile wallet adapter.
//!
//! OAuth client-credentials authentication, then a JSON payment create
//! whose response carries the wallet's redirect URL. Amounts are integers
//! in CLP. A payment that is still `pending` at confirm time is surfaced
//! as an error so the reconciler reports it indeterminate instead of
//! finalizing prematurely; the wallet's callback webhook settles it later.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use aquapay_common::{
    BoxFuture, OutcomeStatus, PaymentInitResult, PaymentProvider, PaymentRequest, ProviderError,
    ProviderKind, RefundResult, TransactionOutcome, HTTP_CLIENT,
};
use aquapay_config::MachConfig;

use crate::require_env;

#[derive(Serialize, Debug)]
struct MachAuthRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize, Debug)]
struct MachAuthResponse {
    access_token: String,
}

#[derive(Serialize, Debug)]
struct MachCustomer<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
}

#[derive(Serialize, Debug)]
struct MachCreateRequest<'a> {
    amount: i64,
    currency: &'a str,
    description: String,
    customer: MachCustomer<'a>,
    callback_url: &'a str,
    return_url: &'a str,
}

#[derive(Deserialize, Debug)]
struct MachCreateResponse {
    payment_id: String,
    payment_url: String,
}

#[derive(Deserialize, Debug)]
struct MachPaymentStatus {
    status: String,
    amount: i64,
    authorization_code: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug)]
struct MachRefundRequest {
    amount: i64,
}

#[derive(Deserialize, Debug)]
struct MachRefundResponse {
    status: String,
    refunded_amount: Option<i64>,
}

pub struct MachWallet {
    config: MachConfig,
    client: Client,
}

impl MachWallet {
    pub fn new(config: MachConfig) -> Self {
        Self {
            config,
            client: HTTP_CLIENT.clone(),
        }
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        let secret = require_env(self.kind(), "MACH_CLIENT_SECRET")?;
        let response = self
            .client
            .post(format!("{}/oauth/token", self.config.base_url))
            .json(&MachAuthRequest {
                client_id: &self.config.client_id,
                client_secret: &secret,
                grant_type: "client_credentials",
            })
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                provider: self.kind(),
                status: status.as_u16(),
                message: "wallet token request rejected".to_string(),
            });
        }
        let auth: MachAuthResponse = response.json().await.map_err(|e| ProviderError::Parse {
            provider: self.kind(),
            message: e.to_string(),
        })?;
        Ok(auth.access_token)
    }
}

/// Wallet status mapping. `pending` is intentionally NOT mapped: a payment
/// that has not settled must not be finalized from a browser return.
fn map_status(status: &str) -> Option<OutcomeStatus> {
    match status {
        "approved" => Some(OutcomeStatus::Authorized),
        "rejected" => Some(OutcomeStatus::Rejected),
        "expired" | "cancelled" => Some(OutcomeStatus::Timeout),
        _ => None,
    }
}

impl PaymentProvider for MachWallet {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mach
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
            let body = MachCreateRequest {
                amount: request.amount,
                currency: &request.currency,
                description: format!("Pedido {}", request.order_id),
                customer: MachCustomer {
                    name: &request.customer.name,
                    email: &request.customer.email,
                    phone: &request.customer.phone,
                },
                callback_url: &self.config.callback_url,
                return_url: &self.config.return_url,
            };

            info!(order_id = %request.order_id, "Creating Mach payment");
            let response = self
                .client
                .post(format!("{}/payments", self.config.base_url))
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

            let created: MachCreateResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            Ok(PaymentInitResult {
                redirect_url: created.payment_url,
                provider_token: created.payment_id,
            })
        })
    }

    fn confirm(&self, token: &str) -> BoxFuture<'_, TransactionOutcome, ProviderError> {
        let token = token.to_string();
        Box::pin(async move {
            let access = self.access_token().await?;
            let response = self
                .client
                .get(format!("{}/payments/{}", self.config.base_url, token))
                .bearer_auth(&access)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Api {
                    provider: self.kind(),
                    status: status.as_u16(),
                    message: "wallet payment lookup failed".to_string(),
                });
            }

            let payment: MachPaymentStatus =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            let outcome_status =
                map_status(&payment.status).ok_or_else(|| ProviderError::Api {
                    provider: self.kind(),
                    status: 202,
                    message: format!("payment not settled yet: {}", payment.status),
                })?;

            Ok(TransactionOutcome {
                status: outcome_status,
                amount: payment.amount,
                authorization_code: payment.authorization_code,
                account_mask: None,
                transaction_date: payment.updated_at.unwrap_or_else(Utc::now),
            })
        })
    }

    fn refund(&self, token: &str, amount: i64) -> BoxFuture<'_, RefundResult, ProviderError> {
        let token = token.to_string();
        Box::pin(async move {
            let access = self.access_token().await?;
            let response = self
                .client
                .post(format!(
                    "{}/payments/{}/refunds",
                    self.config.base_url, token
                ))
                .bearer_auth(&access)
                .json(&MachRefundRequest { amount })
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

            let status = response.status();
            if status.as_u16() == 409 {
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

            let refunded: MachRefundResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            Ok(RefundResult {
                provider: ProviderKind::Mach,
                status: refunded.status,
                nullified_amount: refunded.refunded_amount.unwrap_or(amount),
                authorization_code: None,
            })
        })
    }
}
