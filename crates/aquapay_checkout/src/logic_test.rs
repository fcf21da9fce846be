#[cfg(test)]
mod tests {
    use crate::guard::SlidingWindowGuard;
    use crate::ledger::{TransactionLedger, TransactionState};
    use crate::logic::{CheckoutError, CheckoutService, RefundError};
    use aquapay_common::{
        BoxFuture, CartItem, CartSnapshot, Customer, OutcomeStatus, PaymentInitResult,
        PaymentProvider, PaymentRequest, ProviderError, ProviderKind, ProviderRegistry,
        RefundResult, TransactionOutcome,
    };
    use aquapay_config::CheckoutConfig;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// A scriptable in-memory provider adapter.
    struct StubProvider {
        kind: ProviderKind,
        max_amount: i64,
        fail_initiate: bool,
        initiate_calls: AtomicUsize,
        seen_orders: Mutex<Vec<String>>,
    }

    impl StubProvider {
        fn new(kind: ProviderKind, max_amount: i64) -> Self {
            StubProvider {
                kind,
                max_amount,
                fail_initiate: false,
                initiate_calls: AtomicUsize::new(0),
                seen_orders: Mutex::new(Vec::new()),
            }
        }

        fn failing(kind: ProviderKind, max_amount: i64) -> Self {
            StubProvider {
                fail_initiate: true,
                ..Self::new(kind, max_amount)
            }
        }
    }

    impl PaymentProvider for StubProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn max_amount(&self) -> i64 {
            self.max_amount
        }

        fn initiate(
            &self,
            request: &PaymentRequest,
        ) -> BoxFuture<'_, PaymentInitResult, ProviderError> {
            self.initiate_calls.fetch_add(1, Ordering::SeqCst);
            let order_id = request.order_id.clone();
            self.seen_orders.lock().unwrap().push(order_id.clone());
            let fail = self.fail_initiate;
            let kind = self.kind;
            Box::pin(async move {
                if fail {
                    return Err(ProviderError::Unavailable {
                        provider: kind,
                        message: "connection refused".to_string(),
                    });
                }
                Ok(PaymentInitResult {
                    redirect_url: format!("https://pay.example/{order_id}"),
                    provider_token: format!("tok-{order_id}"),
                })
            })
        }

        fn confirm(&self, _token: &str) -> BoxFuture<'_, TransactionOutcome, ProviderError> {
            Box::pin(async move {
                Ok(TransactionOutcome {
                    status: OutcomeStatus::Authorized,
                    amount: 7000,
                    authorization_code: Some("AUTH-1".to_string()),
                    account_mask: None,
                    transaction_date: Utc::now(),
                })
            })
        }

        fn refund(&self, _token: &str, amount: i64) -> BoxFuture<'_, RefundResult, ProviderError> {
            let kind = self.kind;
            Box::pin(async move {
                Ok(RefundResult {
                    provider: kind,
                    status: "NULLIFIED".to_string(),
                    nullified_amount: amount,
                    authorization_code: Some("REV-1".to_string()),
                })
            })
        }
    }

    fn test_cart() -> CartSnapshot {
        CartSnapshot::new(vec![CartItem {
            product_id: "1".to_string(),
            unit_price: 3500,
            quantity: 2,
        }])
    }

    fn test_customer() -> Customer {
        Customer {
            id: "user-1".to_string(),
            name: "Maria Soto".to_string(),
            email: "maria@example.com".to_string(),
            phone: "+56911112222".to_string(),
            address: "Av. Siempreviva 742".to_string(),
            city: "Concepcion".to_string(),
            region: "Biobio".to_string(),
        }
    }

    struct Harness {
        service: CheckoutService,
        ledger: Arc<TransactionLedger>,
        provider: Arc<StubProvider>,
    }

    fn harness(provider: StubProvider) -> Harness {
        let provider = Arc::new(provider);
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::clone(&provider) as Arc<dyn PaymentProvider>);
        let ledger = Arc::new(TransactionLedger::new());
        let service = CheckoutService::new(
            CheckoutConfig::default(),
            Arc::new(registry),
            Arc::clone(&ledger),
            Arc::new(SlidingWindowGuard::new()),
        );
        Harness {
            service,
            ledger,
            provider,
        }
    }

    #[tokio::test]
    async fn test_happy_path_initiates_and_returns_redirect() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));

        let redirect = h
            .service
            .start_checkout(test_cart(), test_customer(), ProviderKind::Webpay)
            .await
            .unwrap();

        assert!(redirect.redirect_url.starts_with("https://pay.example/"));
        let record = h.ledger.get(&redirect.order_id).unwrap();
        assert_eq!(record.state, TransactionState::Initiated);
        assert_eq!(record.request.amount, 7000, "amount recomputed from cart");
        assert_eq!(record.request.currency, "CLP");
        assert_eq!(
            record.provider_token.as_deref(),
            Some(format!("tok-{}", redirect.order_id).as_str())
        );
    }

    #[tokio::test]
    async fn test_empty_cart_rejected_before_any_side_effect() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));

        let err = h
            .service
            .start_checkout(
                CartSnapshot::new(vec![]),
                test_customer(),
                ProviderKind::Webpay,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_invalid_cart_line_rejected() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));
        let cart = CartSnapshot::new(vec![CartItem {
            product_id: "1".to_string(),
            unit_price: 3500,
            quantity: 0,
        }]);

        let err = h
            .service
            .start_checkout(cart, test_customer(), ProviderKind::Webpay)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidCart(_)));
    }

    #[tokio::test]
    async fn test_overflowing_cart_total_rejected_before_any_side_effect() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));
        // Each line passes validation on its own; only the recomputed
        // total overflows. A wrapped total must never reach the amount cap.
        let cart = CartSnapshot::new(vec![CartItem {
            product_id: "1".to_string(),
            unit_price: i64::MAX / 2 + 1,
            quantity: 2,
        }]);

        let err = h
            .service
            .start_checkout(cart, test_customer(), ProviderKind::Webpay)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidCart(_)));
        assert_eq!(h.provider.initiate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthenticated_customer_rejected() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));
        let customer = Customer {
            id: String::new(),
            ..test_customer()
        };

        let err = h
            .service
            .start_checkout(test_cart(), customer, ProviderKind::Webpay)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::UnauthenticatedCustomer));
    }

    #[tokio::test]
    async fn test_disabled_provider_rejected() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));

        let err = h
            .service
            .start_checkout(test_cart(), test_customer(), ProviderKind::Mach)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidProvider(_)));
    }

    #[tokio::test]
    async fn test_amount_above_provider_maximum_rejected() {
        let h = harness(StubProvider::new(ProviderKind::Mach, 2_000_000));
        let cart = CartSnapshot::new(vec![CartItem {
            product_id: "9".to_string(),
            unit_price: 2_000_001,
            quantity: 1,
        }]);

        let err = h
            .service
            .start_checkout(cart, test_customer(), ProviderKind::Mach)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::AmountTooLarge {
                amount: 2_000_001,
                max: 2_000_000
            }
        ));
    }

    #[tokio::test]
    async fn test_sixth_attempt_in_window_is_throttled() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));

        for _ in 0..5 {
            h.service
                .start_checkout(test_cart(), test_customer(), ProviderKind::Webpay)
                .await
                .unwrap();
        }
        let err = h
            .service
            .start_checkout(test_cart(), test_customer(), ProviderKind::Webpay)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::RateLimited));
    }

    #[tokio::test]
    async fn test_initiation_failure_leaves_row_open() {
        let h = harness(StubProvider::failing(ProviderKind::Webpay, 999_999_999));

        let err = h
            .service
            .start_checkout(test_cart(), test_customer(), ProviderKind::Webpay)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ProviderUnavailable(_)));

        // The ledger row was opened before the provider call and stays
        // OPEN, with no token, until the stale sweep collects it.
        let order_id = h.provider.seen_orders.lock().unwrap()[0].clone();
        let record = h.ledger.get(&order_id).unwrap();
        assert_eq!(record.state, TransactionState::Open);
        assert!(record.provider_token.is_none());
        assert_eq!(h.provider.initiate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refund_requires_confirmed_state() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));
        let redirect = h
            .service
            .start_checkout(test_cart(), test_customer(), ProviderKind::Webpay)
            .await
            .unwrap();

        let err = h.service.refund(&redirect.order_id, 7000).await.unwrap_err();
        assert!(matches!(
            err,
            RefundError::NotRefundable {
                state: TransactionState::Initiated,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_refund_of_confirmed_transaction() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));
        let redirect = h
            .service
            .start_checkout(test_cart(), test_customer(), ProviderKind::Webpay)
            .await
            .unwrap();
        h.ledger
            .finalize(
                &redirect.order_id,
                TransactionOutcome {
                    status: OutcomeStatus::Authorized,
                    amount: 7000,
                    authorization_code: Some("AUTH-1".to_string()),
                    account_mask: None,
                    transaction_date: Utc::now(),
                },
            )
            .unwrap();

        let result = h.service.refund(&redirect.order_id, 7000).await.unwrap();
        assert_eq!(result.nullified_amount, 7000);

        let err = h
            .service
            .refund(&redirect.order_id, 8000)
            .await
            .unwrap_err();
        assert!(matches!(err, RefundError::AmountExceedsCharge { .. }));
    }

    #[tokio::test]
    async fn test_refund_unknown_order() {
        let h = harness(StubProvider::new(ProviderKind::Webpay, 999_999_999));
        let err = h.service.refund("ORD-missing", 100).await.unwrap_err();
        assert!(matches!(err, RefundError::NotFound(_)));
    }
}
