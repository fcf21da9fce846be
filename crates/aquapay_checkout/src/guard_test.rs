#[cfg(test)]
mod tests {
    use crate::guard::SlidingWindowGuard;
    use aquapay_config::RateLimitPolicy;

    fn policy(max_attempts: u32, window_ms: i64) -> RateLimitPolicy {
        RateLimitPolicy {
            max_attempts,
            window_ms,
        }
    }

    #[test]
    fn test_allows_up_to_max_attempts_then_blocks() {
        let guard = SlidingWindowGuard::new();
        let policy = policy(5, 60_000);
        let now = 1_000_000;

        for i in 0..5 {
            assert!(
                guard.check_and_record_at("user-1", policy, now + i),
                "attempt {} should pass",
                i + 1
            );
        }
        assert!(
            !guard.check_and_record_at("user-1", policy, now + 5),
            "sixth attempt inside the window must be blocked"
        );
    }

    #[test]
    fn test_blocked_attempt_is_not_recorded() {
        let guard = SlidingWindowGuard::new();
        let policy = policy(1, 60_000);
        let now = 1_000_000;

        assert!(guard.check_and_record_at("k", policy, now));
        // Hammering while blocked must not extend the lockout.
        for i in 1..100 {
            assert!(!guard.check_and_record_at("k", policy, now + i));
        }
        assert!(
            guard.check_and_record_at("k", policy, now + 60_001),
            "one window after the single recorded attempt the key is free again"
        );
    }

    #[test]
    fn test_window_slides() {
        let guard = SlidingWindowGuard::new();
        let policy = policy(2, 1_000);

        assert!(guard.check_and_record_at("k", policy, 0));
        assert!(guard.check_and_record_at("k", policy, 600));
        assert!(!guard.check_and_record_at("k", policy, 900));

        // At t=1001 the attempt at t=0 has left the window.
        assert!(guard.check_and_record_at("k", policy, 1_001));
        // But now attempts at 600 and 1001 still fill it.
        assert!(!guard.check_and_record_at("k", policy, 1_200));
    }

    #[test]
    fn test_idle_keys_are_dropped_after_their_window() {
        let guard = SlidingWindowGuard::new();
        let policy = policy(5, 60_000);
        let now = 1_000_000;

        // One confirm key per return token would otherwise pile up forever.
        for i in 0..100 {
            assert!(guard.check_and_record_at(&format!("confirm:tok-{i}"), policy, now));
        }
        assert_eq!(guard.tracked_keys(), 100);

        // Any check one window later sweeps the idle keys out.
        assert!(guard.check_and_record_at("user-1", policy, now + 60_001));
        assert_eq!(guard.tracked_keys(), 1);
    }

    #[test]
    fn test_sweep_respects_each_keys_own_window() {
        let guard = SlidingWindowGuard::new();
        let short = policy(5, 1_000);
        let long = policy(5, 60_000);
        let now = 1_000_000;

        assert!(guard.check_and_record_at("confirm:tok-1", long, now));
        // A short-window check after the short window but inside the long
        // one must not free the long-window key.
        assert!(guard.check_and_record_at("user-1", short, now + 2_000));
        assert_eq!(guard.tracked_keys(), 2);

        for i in 0..4 {
            assert!(guard.check_and_record_at("confirm:tok-1", long, now + 2_001 + i));
        }
        assert!(
            !guard.check_and_record_at("confirm:tok-1", long, now + 2_010),
            "attempts recorded before the sweep still count inside the long window"
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let guard = SlidingWindowGuard::new();
        let policy = policy(1, 60_000);
        let now = 5_000_000;

        assert!(guard.check_and_record_at("user-1", policy, now));
        assert!(!guard.check_and_record_at("user-1", policy, now + 1));
        assert!(
            guard.check_and_record_at("user-2", policy, now + 1),
            "a throttled key must not affect other keys"
        );
        assert!(guard.check_and_record_at("confirm:tok-1", policy, now + 1));
    }
}
