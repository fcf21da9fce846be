// --- File: crates/aquapay_providers/src/webpay.rs ---
//! Webpay Plus (Transbank-style) bank gateway adapter.
//!
//! Redirect-based flow: create a transaction, send the user to the
//! gateway, and confirm after the gateway redirects back with a `token_ws`
//! query parameter. Amounts are integers in CLP.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use aquapay_common::{
    mask_account, BoxFuture, OutcomeStatus, PaymentInitResult, PaymentProvider, PaymentRequest,
    ProviderError, ProviderKind, RefundResult, TransactionOutcome, HTTP_CLIENT,
};
use aquapay_config::WebpayConfig;

use crate::require_env;

const TRANSACTIONS_PATH: &str = "/rswebpaytransaction/api/webpay/v1.2/transactions";

#[derive(Serialize, Debug)]
struct WebpayCreateRequest<'a> {
    buy_order: &'a str,
    session_id: String,
    amount: i64,
    return_url: &'a str,
}

#[derive(Deserialize, Debug)]
struct WebpayCreateResponse {
    token: String,
    url: String,
}

#[derive(Deserialize, Debug)]
struct WebpayCardDetail {
    card_number: Option<String>,
}

#[derive(Deserialize, Debug)]
struct WebpayConfirmResponse {
    status: String,
    amount: i64,
    response_code: Option<i64>,
    authorization_code: Option<String>,
    card_detail: Option<WebpayCardDetail>,
    transaction_date: Option<String>,
}

#[derive(Serialize, Debug)]
struct WebpayRefundRequest {
    amount: i64,
}

#[derive(Deserialize, Debug)]
struct WebpayRefundResponse {
    #[serde(rename = "type")]
    refund_type: String,
    nullified_amount: Option<i64>,
    authorization_code: Option<String>,
    response_code: Option<i64>,
}

/// The bank gateway adapter.
pub struct WebpayGateway {
    config: WebpayConfig,
    client: Client,
}

impl WebpayGateway {
    pub fn new(config: WebpayConfig) -> Self {
        Self {
            config,
            client: HTTP_CLIENT.clone(),
        }
    }
}

/// Map a gateway confirmation to the generic outcome.
///
/// `AUTHORIZED` with response code 0 is the only approval; expiry-class
/// statuses become `Timeout`, everything else is an ordinary decline.
fn map_status(status: &str, response_code: Option<i64>) -> OutcomeStatus {
    match status {
        "AUTHORIZED" if response_code.unwrap_or(0) == 0 => OutcomeStatus::Authorized,
        "TIMEOUT" | "EXPIRED" | "ABORTED" => OutcomeStatus::Timeout,
        _ => OutcomeStatus::Rejected,
    }
}

fn parse_transaction_date(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn outcome_from_confirm(response: WebpayConfirmResponse) -> TransactionOutcome {
    TransactionOutcome {
        status: map_status(&response.status, response.response_code),
        amount: response.amount,
        authorization_code: response.authorization_code,
        account_mask: response
            .card_detail
            .and_then(|d| d.card_number)
            .map(|n| mask_account(&n)),
        transaction_date: parse_transaction_date(response.transaction_date.as_deref()),
    }
}

impl PaymentProvider for WebpayGateway {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Webpay
    }

    fn max_amount(&self) -> i64 {
        self.config.max_amount
    }

    fn return_token_param(&self) -> &'static str {
        "token_ws"
    }

    fn initiate(
        &self,
        request: &PaymentRequest,
    ) -> BoxFuture<'_, PaymentInitResult, ProviderError> {
        let order_id = request.order_id.clone();
        let amount = request.amount;
        Box::pin(async move {
            let secret = require_env(self.kind(), "WEBPAY_API_KEY_SECRET")?;
            let url = format!("{}{}", self.config.base_url, TRANSACTIONS_PATH);
            let body = WebpayCreateRequest {
                buy_order: &order_id,
                session_id: format!("S-{}", uuid::Uuid::new_v4().simple()),
                amount,
                return_url: &self.config.return_url,
            };

            info!(order_id = %order_id, amount, "Creating Webpay transaction");
            let response = self
                .client
                .post(&url)
                .header("Tbk-Api-Key-Id", &self.config.commerce_code)
                .header("Tbk-Api-Key-Secret", &secret)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::from_reqwest(self.kind(), e))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                warn!(%status, "Webpay create failed: {text}");
                return Err(ProviderError::Api {
                    provider: self.kind(),
                    status: status.as_u16(),
                    message: text,
                });
            }

            let created: WebpayCreateResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            Ok(PaymentInitResult {
                redirect_url: format!(
                    "{}?{}={}",
                    created.url,
                    self.return_token_param(),
                    created.token
                ),
                provider_token: created.token,
            })
        })
    }

    fn confirm(&self, token: &str) -> BoxFuture<'_, TransactionOutcome, ProviderError> {
        let token = token.to_string();
        Box::pin(async move {
            let secret = require_env(self.kind(), "WEBPAY_API_KEY_SECRET")?;
            let url = format!("{}{}/{}", self.config.base_url, TRANSACTIONS_PATH, token);

            let response = self
                .client
                .put(&url)
                .header("Tbk-Api-Key-Id", &self.config.commerce_code)
                .header("Tbk-Api-Key-Secret", &secret)
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

            let confirmed: WebpayConfirmResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;
            info!(status = %confirmed.status, "Webpay confirmation received");
            Ok(outcome_from_confirm(confirmed))
        })
    }

    fn refund(&self, token: &str, amount: i64) -> BoxFuture<'_, RefundResult, ProviderError> {
        let token = token.to_string();
        Box::pin(async move {
            let secret = require_env(self.kind(), "WEBPAY_API_KEY_SECRET")?;
            let url = format!(
                "{}{}/{}/refunds",
                self.config.base_url, TRANSACTIONS_PATH, token
            );

            let response = self
                .client
                .post(&url)
                .header("Tbk-Api-Key-Id", &self.config.commerce_code)
                .header("Tbk-Api-Key-Secret", &secret)
                .json(&WebpayRefundRequest { amount })
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

            let refunded: WebpayRefundResponse =
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: self.kind(),
                    message: e.to_string(),
                })?;

            if refunded.response_code.unwrap_or(0) != 0 {
                return Err(ProviderError::InsufficientBalance {
                    provider: self.kind(),
                });
            }

            Ok(RefundResult {
                provider: ProviderKind::Webpay,
                status: refunded.refund_type,
                nullified_amount: refunded.nullified_amount.unwrap_or(amount),
                authorization_code: refunded.authorization_code,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorized_with_zero_response_code_is_authorized() {
        assert_eq!(map_status("AUTHORIZED", Some(0)), OutcomeStatus::Authorized);
        assert_eq!(map_status("AUTHORIZED", None), OutcomeStatus::Authorized);
    }

    #[test]
    fn authorized_with_nonzero_response_code_is_rejected() {
        assert_eq!(map_status("AUTHORIZED", Some(-1)), OutcomeStatus::Rejected);
    }

    #[test]
    fn expiry_class_statuses_map_to_timeout() {
        assert_eq!(map_status("TIMEOUT", Some(0)), OutcomeStatus::Timeout);
        assert_eq!(map_status("EXPIRED", None), OutcomeStatus::Timeout);
        assert_eq!(map_status("ABORTED", None), OutcomeStatus::Timeout);
    }

    #[test]
    fn unknown_statuses_are_declines() {
        assert_eq!(map_status("FAILED", Some(-1)), OutcomeStatus::Rejected);
        assert_eq!(map_status("NULLIFIED", None), OutcomeStatus::Rejected);
    }

    #[test]
    fn confirm_response_is_masked_into_outcome() {
        let outcome = outcome_from_confirm(WebpayConfirmResponse {
            status: "AUTHORIZED".to_string(),
            amount: 7000,
            response_code: Some(0),
            authorization_code: Some("123456".to_string()),
            card_detail: Some(WebpayCardDetail {
                card_number: Some("4051885600446623".to_string()),
            }),
            transaction_date: Some("2025-07-15T10:00:00Z".to_string()),
        });
        assert_eq!(outcome.status, OutcomeStatus::Authorized);
        assert_eq!(outcome.amount, 7000);
        assert_eq!(outcome.account_mask.as_deref(), Some("****6623"));
    }

    #[test]
    fn bad_transaction_date_falls_back_to_now() {
        let parsed = parse_transaction_date(Some("not-a-date"));
        assert!((Utc::now() - parsed).num_seconds() < 5);
    }
}
