// File: services/aquapay_backend/src/app_state.rs
//! Wires the checkout core together from the loaded configuration.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing::{debug, error};

use aquapay_checkout::{
    CheckoutService, CheckoutState, ReturnReconciler, SlidingWindowGuard, TransactionLedger,
};
use aquapay_common::AquapayError;
use aquapay_config::AppConfig;
use aquapay_providers::build_registry;

/// Build the shared handler state: provider registry, ledger, guard,
/// orchestrator and reconciler, all over the same ledger instance.
pub fn build_state(config: Arc<AppConfig>) -> Result<Arc<CheckoutState>, AquapayError> {
    let registry = Arc::new(build_registry(&config)?);
    let ledger = Arc::new(TransactionLedger::new());
    let guard = Arc::new(SlidingWindowGuard::new());

    let service = Arc::new(CheckoutService::new(
        config.checkout.clone(),
        Arc::clone(&registry),
        Arc::clone(&ledger),
        Arc::clone(&guard),
    ));
    let reconciler = Arc::new(ReturnReconciler::new(
        registry,
        Arc::clone(&ledger),
        guard,
        config.checkout.confirm_rate_limit,
    ));

    Ok(Arc::new(CheckoutState {
        config,
        service,
        reconciler,
        ledger,
    }))
}

/// Periodically expire abandoned OPEN/INITIATED transactions. The sweep
/// interval is a fraction of the staleness window so rows are collected
/// reasonably soon after they age out.
pub fn spawn_stale_sweeper(state: Arc<CheckoutState>) {
    let stale_secs = state.config.checkout.stale_after_secs.max(60);
    let interval = Duration::from_secs((stale_secs as u64 / 10).clamp(60, 3600));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match ChronoDuration::try_seconds(stale_secs) {
                Some(window) => {
                    let swept = state.ledger.expire_stale(window);
                    if swept > 0 {
                        debug!(swept, "Stale transaction sweep");
                    }
                }
                None => error!(stale_secs, "Invalid staleness window, sweep skipped"),
            }
        }
    });
}
