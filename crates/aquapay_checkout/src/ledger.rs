// --- File: crates/aquapay_checkout/src/ledger.rs ---
//! The transaction ledger: the authoritative record of transaction state.
//!
//! The ledger exclusively owns transaction rows; orchestrator and
//! reconciler only reference them by order id and mutate through the
//! transition methods here, so the one-shot finalize invariant is enforced
//! in exactly one place. A single mutex serializes `mark_initiated` and
//! `finalize`: under concurrent duplicate confirmations exactly one call
//! effects the transition, every other caller observes the stored result.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use aquapay_common::{
    HttpStatusCode, OutcomeStatus, PaymentRequest, ProviderKind, TransactionOutcome,
};

/// Lifecycle of a ledger row. `Confirmed`, `Rejected` and `Expired` are
/// terminal; there is no transition out of a terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum TransactionState {
    Open,
    Initiated,
    Confirmed,
    Rejected,
    Expired,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Confirmed | TransactionState::Rejected | TransactionState::Expired
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionState::Open => "OPEN",
            TransactionState::Initiated => "INITIATED",
            TransactionState::Confirmed => "CONFIRMED",
            TransactionState::Rejected => "REJECTED",
            TransactionState::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// A ledger row: the captured request plus everything learned since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub request: PaymentRequest,
    pub state: TransactionState,
    pub provider_token: Option<String>,
    pub outcome: Option<TransactionOutcome>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    pub fn order_id(&self) -> &str {
        &self.request.order_id
    }

    pub fn provider(&self) -> ProviderKind {
        self.request.provider
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.request.created_at
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    /// A live (non-expired) transaction already exists for the order id.
    #[error("a transaction already exists for order {0}")]
    DuplicateOrderId(String),

    /// The requested transition is not legal from the row's state.
    /// Bug-class: callers drive the state machine, they never race it.
    #[error("invalid transition for order {order_id} in state {state}")]
    InvalidTransition {
        order_id: String,
        state: TransactionState,
    },

    /// No transaction for the order id.
    #[error("no transaction for order {0}")]
    NotFound(String),
}

impl HttpStatusCode for LedgerError {
    fn status_code(&self) -> u16 {
        match self {
            LedgerError::DuplicateOrderId(_) => 409,
            LedgerError::InvalidTransition { .. } => 500,
            LedgerError::NotFound(_) => 404,
        }
    }
}

#[derive(Default)]
struct LedgerInner {
    by_order: HashMap<String, TransactionRecord>,
    /// provider token -> order id, recorded at mark_initiated time so the
    /// return reconciler can resolve a token without asking the adapter.
    by_token: HashMap<String, String>,
}

/// In-memory transaction ledger, safe for concurrent checkout/return flows.
#[derive(Default)]
pub struct TransactionLedger {
    inner: Mutex<LedgerInner>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        // A poisoned lock means a panic while holding it; the map itself
        // is still consistent (every transition is a single assignment).
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a transaction for a payment request.
    ///
    /// Fails with `DuplicateOrderId` if a live row exists; an `Expired`
    /// row may be reopened by a genuinely new attempt.
    pub fn open(&self, request: &PaymentRequest) -> Result<TransactionRecord, LedgerError> {
        let mut inner = self.lock();
        let stale_token = match inner.by_order.get(&request.order_id) {
            Some(existing) if existing.state != TransactionState::Expired => {
                return Err(LedgerError::DuplicateOrderId(request.order_id.clone()));
            }
            Some(existing) => existing.provider_token.clone(),
            None => None,
        };
        // The superseded attempt's token must not resolve to the fresh
        // row, or a replayed old confirmation could finalize it.
        if let Some(token) = stale_token {
            inner.by_token.remove(&token);
        }
        let record = TransactionRecord {
            request: request.clone(),
            state: TransactionState::Open,
            provider_token: None,
            outcome: None,
            finalized_at: None,
        };
        inner
            .by_order
            .insert(request.order_id.clone(), record.clone());
        debug!(order_id = %request.order_id, "Transaction opened");
        Ok(record)
    }

    /// Record the provider token and move `Open -> Initiated`.
    pub fn mark_initiated(&self, order_id: &str, token: &str) -> Result<(), LedgerError> {
        let mut inner = self.lock();
        let record = inner
            .by_order
            .get_mut(order_id)
            .ok_or_else(|| LedgerError::NotFound(order_id.to_string()))?;
        if record.state != TransactionState::Open {
            return Err(LedgerError::InvalidTransition {
                order_id: order_id.to_string(),
                state: record.state,
            });
        }
        record.state = TransactionState::Initiated;
        record.provider_token = Some(token.to_string());
        inner
            .by_token
            .insert(token.to_string(), order_id.to_string());
        debug!(order_id, "Transaction initiated");
        Ok(())
    }

    /// Apply a provider outcome.
    ///
    /// Finalization is one-shot: if the row is already terminal the stored
    /// row is returned unchanged, whatever outcome the caller brought.
    pub fn finalize(
        &self,
        order_id: &str,
        outcome: TransactionOutcome,
    ) -> Result<TransactionRecord, LedgerError> {
        let mut inner = self.lock();
        let record = inner
            .by_order
            .get_mut(order_id)
            .ok_or_else(|| LedgerError::NotFound(order_id.to_string()))?;

        if record.state.is_terminal() {
            debug!(order_id, state = %record.state, "Duplicate finalize ignored");
            return Ok(record.clone());
        }

        record.state = match outcome.status {
            OutcomeStatus::Authorized => TransactionState::Confirmed,
            OutcomeStatus::Rejected => TransactionState::Rejected,
            OutcomeStatus::Timeout => TransactionState::Expired,
        };
        record.outcome = Some(outcome);
        record.finalized_at = Some(Utc::now());
        info!(order_id, state = %record.state, "Transaction finalized");
        Ok(record.clone())
    }

    pub fn get(&self, order_id: &str) -> Result<TransactionRecord, LedgerError> {
        self.lock()
            .by_order
            .get(order_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(order_id.to_string()))
    }

    /// Resolve a return token to its transaction.
    pub fn find_by_token(&self, token: &str) -> Option<TransactionRecord> {
        let inner = self.lock();
        let order_id = inner.by_token.get(token)?;
        inner.by_order.get(order_id).cloned()
    }

    /// Sweep abandoned rows: any `Open`/`Initiated` transaction older than
    /// `stale_after` is marked `Expired`. Returns the number swept.
    /// Callers schedule this; the ledger runs no background task.
    pub fn expire_stale(&self, stale_after: Duration) -> usize {
        let cutoff = Utc::now() - stale_after;
        let mut inner = self.lock();
        let mut swept = 0;
        for record in inner.by_order.values_mut() {
            if !record.state.is_terminal() && record.created_at() < cutoff {
                record.state = TransactionState::Expired;
                record.finalized_at = Some(Utc::now());
                swept += 1;
                warn!(order_id = %record.order_id(), "Abandoned transaction expired");
            }
        }
        swept
    }
}
