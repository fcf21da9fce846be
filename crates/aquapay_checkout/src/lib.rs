// --- File: crates/aquapay_checkout/src/lib.rs ---
//! The checkout core: transaction ledger, rate/replay guard, checkout
//! orchestrator, return reconciler, and webhook reconciliation, plus the
//! axum surface that exposes them.
//!
//! Checkout and return are two independent entry points correlated only
//! through the ledger (order id and provider token); no in-memory state
//! spans the provider redirect.

// Declare modules within this crate
pub mod doc;
pub mod guard;
#[cfg(test)]
mod guard_test;
pub mod handlers;
pub mod ledger;
pub mod logic;
#[cfg(test)]
mod logic_test;
pub mod reconciler;
pub mod routes;
pub mod webhook;
#[cfg(test)]
mod webhook_test;

// Re-export for the main backend
pub use guard::SlidingWindowGuard;
pub use handlers::CheckoutState;
pub use ledger::{LedgerError, TransactionLedger, TransactionRecord, TransactionState};
pub use logic::{CheckoutError, CheckoutRedirect, CheckoutService, RefundError};
pub use reconciler::{ReceiptView, ReconcileError, ReturnReconciler, ReturnResult, ReturnStatus};
pub use routes::routes;
