// --- File: crates/aquapay_checkout/src/reconciler.rs ---
//! The return reconciler: turns a provider return token into a finalized
//! transaction and a display-safe receipt.
//!
//! A transport failure during confirmation is reported as
//! `Indeterminate`, never as a payment failure: the charge may have
//! succeeded on the provider's side, the ledger row stays non-terminal,
//! and an out-of-band webhook can still finalize it correctly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use aquapay_common::{mask_account, HttpStatusCode, ProviderRegistry};
use aquapay_config::RateLimitPolicy;

use crate::guard::SlidingWindowGuard;
use crate::ledger::{LedgerError, TransactionLedger, TransactionRecord, TransactionState};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("no transaction token in the return payload")]
    MissingToken,

    #[error("no transaction for the supplied token")]
    TransactionNotFound,

    #[error("too many confirmation attempts for this token")]
    ReplayThrottled,

    /// Bug-class: the token index resolved an order the ledger lost.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl HttpStatusCode for ReconcileError {
    fn status_code(&self) -> u16 {
        match self {
            ReconcileError::MissingToken => 400,
            ReconcileError::TransactionNotFound => 404,
            ReconcileError::ReplayThrottled => 429,
            ReconcileError::Ledger(_) => 500,
        }
    }
}

/// What the user is told, independent of ledger state. `Indeterminate`
/// is terminal for the UI while the underlying transaction stays
/// non-terminal awaiting out-of-band reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ReturnStatus {
    Success,
    Failed,
    Indeterminate,
}

/// Display-safe summary of a finalized transaction. Never carries the
/// provider token, and the account identifier is always re-masked here,
/// whatever the adapter produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReceiptView {
    pub order_id: String,
    pub state: TransactionState,
    /// Amount and currency come from the ledger row (server-computed),
    /// not from whatever unit the provider reported in.
    pub amount: i64,
    pub currency: String,
    pub authorization_code: Option<String>,
    pub account_mask: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

impl ReceiptView {
    fn from_record(record: &TransactionRecord) -> Self {
        let outcome = record.outcome.as_ref();
        ReceiptView {
            order_id: record.order_id().to_string(),
            state: record.state,
            amount: record.request.amount,
            currency: record.request.currency.clone(),
            authorization_code: outcome.and_then(|o| o.authorization_code.clone()),
            account_mask: outcome
                .and_then(|o| o.account_mask.as_deref())
                .map(mask_account),
            transaction_date: outcome
                .map(|o| o.transaction_date)
                .or(record.finalized_at)
                .unwrap_or_else(|| record.created_at()),
        }
    }
}

/// Result of processing a provider return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReturnResult {
    pub status: ReturnStatus,
    pub receipt: Option<ReceiptView>,
}

fn status_for(state: TransactionState) -> ReturnStatus {
    match state {
        TransactionState::Confirmed => ReturnStatus::Success,
        _ => ReturnStatus::Failed,
    }
}

pub struct ReturnReconciler {
    registry: Arc<ProviderRegistry>,
    ledger: Arc<TransactionLedger>,
    guard: Arc<SlidingWindowGuard>,
    confirm_policy: RateLimitPolicy,
}

impl ReturnReconciler {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        ledger: Arc<TransactionLedger>,
        guard: Arc<SlidingWindowGuard>,
        confirm_policy: RateLimitPolicy,
    ) -> Self {
        Self {
            registry,
            ledger,
            guard,
            confirm_policy,
        }
    }

    /// Query parameter names under which the enabled adapters deliver
    /// their return token, deduplicated. The HTTP layer walks these when
    /// extracting the token instead of hardcoding provider names.
    pub fn return_token_params(&self) -> Vec<&'static str> {
        let mut params = Vec::new();
        for kind in self.registry.enabled_kinds() {
            if let Some(adapter) = self.registry.get(kind) {
                let name = adapter.return_token_param();
                if !params.contains(&name) {
                    params.push(name);
                }
            }
        }
        params
    }

    /// Reconcile a provider return carrying `token`.
    ///
    /// Replays against an already-finalized transaction are answered from
    /// the ledger without another provider call.
    pub async fn reconcile_return(
        &self,
        token: Option<&str>,
    ) -> Result<ReturnResult, ReconcileError> {
        let token = match token {
            Some(t) if !t.trim().is_empty() => t.trim(),
            _ => return Err(ReconcileError::MissingToken),
        };

        if !self
            .guard
            .check_and_record(&format!("confirm:{token}"), self.confirm_policy)
        {
            return Err(ReconcileError::ReplayThrottled);
        }

        let record = self
            .ledger
            .find_by_token(token)
            .ok_or(ReconcileError::TransactionNotFound)?;

        if record.state.is_terminal() {
            info!(order_id = %record.order_id(), state = %record.state,
                "Return replay answered from ledger");
            return Ok(ReturnResult {
                status: status_for(record.state),
                receipt: Some(ReceiptView::from_record(&record)),
            });
        }

        let Some(adapter) = self.registry.get(record.provider()) else {
            // Provider disabled while a redirect was in flight; nothing
            // can be confirmed right now, so leave the row untouched.
            warn!(order_id = %record.order_id(), provider = %record.provider(),
                "No adapter for return confirmation");
            return Ok(ReturnResult {
                status: ReturnStatus::Indeterminate,
                receipt: None,
            });
        };

        let outcome = match adapter.confirm(token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The payment may have succeeded on the provider's side;
                // the row stays non-terminal for out-of-band settlement.
                warn!(order_id = %record.order_id(), transport = e.is_transport(),
                    "Confirmation failed: {e}");
                return Ok(ReturnResult {
                    status: ReturnStatus::Indeterminate,
                    receipt: None,
                });
            }
        };

        let finalized = self.ledger.finalize(record.order_id(), outcome)?;
        Ok(ReturnResult {
            status: status_for(finalized.state),
            receipt: Some(ReceiptView::from_record(&finalized)),
        })
    }
}
