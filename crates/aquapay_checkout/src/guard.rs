// --- File: crates/aquapay_checkout/src/guard.rs ---
//! Sliding-window rate/replay guard.
//!
//! Used for checkout-attempt throttling (keyed by customer id) and
//! confirmation-replay throttling (keyed by return token), with distinct
//! policies from the checkout config.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use aquapay_config::RateLimitPolicy;

/// Attempt timestamps (epoch milliseconds) for one key, together with the
/// window length it was last checked under, so an idle key can be dropped
/// once its own window has fully elapsed.
struct KeyWindow {
    window_ms: i64,
    attempts: Vec<i64>,
}

/// Per-key sliding window of attempt timestamps. The key map is bounded:
/// every check sweeps out keys with no attempt left inside their window,
/// so one-shot keys (return tokens in particular) do not accumulate for
/// the process lifetime.
#[derive(Default)]
pub struct SlidingWindowGuard {
    windows: Mutex<HashMap<String, KeyWindow>>,
}

impl SlidingWindowGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `key` may attempt again under `policy`, and record
    /// the attempt if so. Returns `false` without recording when the
    /// window is full.
    pub fn check_and_record(&self, key: &str, policy: RateLimitPolicy) -> bool {
        self.check_and_record_at(key, policy, Utc::now().timestamp_millis())
    }

    /// Clock-injected variant used by `check_and_record` and by tests.
    pub fn check_and_record_at(&self, key: &str, policy: RateLimitPolicy, now_ms: i64) -> bool {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Sweep keys whose last attempt fell out of their own window.
        windows.retain(|_, w| {
            let start = now_ms - w.window_ms;
            w.attempts.iter().any(|&ts| ts > start)
        });

        let window = windows.entry(key.to_string()).or_insert_with(|| KeyWindow {
            window_ms: policy.window_ms,
            attempts: Vec::new(),
        });
        window.window_ms = policy.window_ms;
        let window_start = now_ms - policy.window_ms;
        window.attempts.retain(|&ts| ts > window_start);

        if window.attempts.len() >= policy.max_attempts as usize {
            return false;
        }
        window.attempts.push(now_ms);
        true
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
