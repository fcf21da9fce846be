#[cfg(test)]
mod tests {
    use crate::ledger::{TransactionLedger, TransactionState};
    use crate::webhook::{
        map_notification_status, process_notification, secret_env_var, verify_signature,
        WebhookError, WebhookEvent,
    };
    use aquapay_common::{
        CartItem, CartSnapshot, Customer, OutcomeStatus, PaymentRequest, ProviderKind,
    };
    use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
    use chrono::Utc;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    fn sign(secret: &str, message: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    #[test]
    fn test_webpay_signature_hex_over_body() {
        let body = br#"{"order_id":"ORD-1","status":"AUTHORIZED"}"#;
        let good = hex::encode(sign("s3cret", body));

        verify_signature(ProviderKind::Webpay, body, Some(&good), None, Some("s3cret")).unwrap();

        let err = verify_signature(
            ProviderKind::Webpay,
            body,
            Some(&hex::encode(sign("wrong", body))),
            None,
            Some("s3cret"),
        )
        .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }

    #[test]
    fn test_mach_signature_base64_over_body() {
        let body = br#"{"token":"pay-1","status":"approved"}"#;
        let good = base64_engine.encode(sign("mach-secret", body));

        verify_signature(ProviderKind::Mach, body, Some(&good), None, Some("mach-secret"))
            .unwrap();
    }

    #[test]
    fn test_mercadopago_signature_covers_request_id_and_body() {
        let body = br#"{"order_id":"ORD-1","status":"approved"}"#;
        let mut signed = b"req-42.".to_vec();
        signed.extend_from_slice(body);
        let good = hex::encode(sign("mp-secret", &signed));

        verify_signature(
            ProviderKind::MercadoPago,
            body,
            Some(&good),
            Some("req-42"),
            Some("mp-secret"),
        )
        .unwrap();

        // The same signature over a different request id must fail.
        let err = verify_signature(
            ProviderKind::MercadoPago,
            body,
            Some(&good),
            Some("req-43"),
            Some("mp-secret"),
        )
        .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));

        let err = verify_signature(
            ProviderKind::MercadoPago,
            body,
            Some(&good),
            None,
            Some("mp-secret"),
        )
        .unwrap_err();
        assert!(matches!(err, WebhookError::MissingSignature));
    }

    #[test]
    fn test_paypal_requires_transmission_header_presence() {
        let body = b"{}";
        verify_signature(ProviderKind::Paypal, body, Some("sig-data"), None, None).unwrap();
        assert!(matches!(
            verify_signature(ProviderKind::Paypal, body, None, None, None).unwrap_err(),
            WebhookError::MissingSignature
        ));
        assert!(matches!(
            verify_signature(ProviderKind::Paypal, body, Some("  "), None, None).unwrap_err(),
            WebhookError::MissingSignature
        ));
    }

    #[test]
    fn test_missing_signature_or_secret() {
        let body = b"{}";
        assert!(matches!(
            verify_signature(ProviderKind::Webpay, body, None, None, Some("s")).unwrap_err(),
            WebhookError::MissingSignature
        ));
        assert!(matches!(
            verify_signature(ProviderKind::Webpay, body, Some("sig"), None, None).unwrap_err(),
            WebhookError::MissingSecret("WEBPAY_WEBHOOK_SECRET")
        ));
    }

    #[test]
    fn test_secret_env_var_per_provider() {
        assert_eq!(
            secret_env_var(ProviderKind::Webpay),
            Some("WEBPAY_WEBHOOK_SECRET")
        );
        assert_eq!(secret_env_var(ProviderKind::Mach), Some("MACH_WEBHOOK_SECRET"));
        assert_eq!(
            secret_env_var(ProviderKind::MercadoPago),
            Some("MP_WEBHOOK_SECRET")
        );
        assert_eq!(secret_env_var(ProviderKind::Paypal), None);
    }

    #[test]
    fn test_status_mapping_per_provider() {
        assert_eq!(
            map_notification_status(ProviderKind::Webpay, "AUTHORIZED"),
            Some(OutcomeStatus::Authorized)
        );
        assert_eq!(
            map_notification_status(ProviderKind::Webpay, "TIMEOUT"),
            Some(OutcomeStatus::Timeout)
        );
        assert_eq!(
            map_notification_status(ProviderKind::Mach, "approved"),
            Some(OutcomeStatus::Authorized)
        );
        assert_eq!(
            map_notification_status(ProviderKind::Mach, "cancelled"),
            Some(OutcomeStatus::Timeout)
        );
        assert_eq!(
            map_notification_status(ProviderKind::Paypal, "DENIED"),
            Some(OutcomeStatus::Rejected)
        );
        assert_eq!(
            map_notification_status(ProviderKind::MercadoPago, "rejected"),
            Some(OutcomeStatus::Rejected)
        );
        // Unsettled statuses stay unmapped.
        assert_eq!(map_notification_status(ProviderKind::Mach, "pending"), None);
        assert_eq!(
            map_notification_status(ProviderKind::MercadoPago, "in_process"),
            None
        );
    }

    fn seeded_ledger() -> TransactionLedger {
        let ledger = TransactionLedger::new();
        let request = PaymentRequest {
            order_id: "ORD-1".to_string(),
            amount: 7000,
            currency: "CLP".to_string(),
            provider: ProviderKind::Mach,
            customer: Customer {
                id: "user-1".to_string(),
                name: "Maria Soto".to_string(),
                email: "maria@example.com".to_string(),
                phone: String::new(),
                address: String::new(),
                city: String::new(),
                region: String::new(),
            },
            cart: CartSnapshot::new(vec![CartItem {
                product_id: "1".to_string(),
                unit_price: 7000,
                quantity: 1,
            }]),
            created_at: Utc::now(),
        };
        ledger.open(&request).unwrap();
        ledger.mark_initiated("ORD-1", "pay-1").unwrap();
        ledger
    }

    #[test]
    fn test_notification_finalizes_by_order_id() {
        let ledger = seeded_ledger();
        let event = WebhookEvent {
            order_id: Some("ORD-1".to_string()),
            token: None,
            status: "approved".to_string(),
            amount: Some(7000),
            authorization_code: Some("AUTH-W".to_string()),
        };

        let record = process_notification(&ledger, ProviderKind::Mach, &event)
            .unwrap()
            .unwrap();
        assert_eq!(record.state, TransactionState::Confirmed);
        assert_eq!(
            record.outcome.unwrap().authorization_code.as_deref(),
            Some("AUTH-W")
        );
    }

    #[test]
    fn test_notification_resolves_by_token_and_replays_idempotently() {
        let ledger = seeded_ledger();
        let event = WebhookEvent {
            order_id: None,
            token: Some("pay-1".to_string()),
            status: "rejected".to_string(),
            amount: None,
            authorization_code: None,
        };

        let first = process_notification(&ledger, ProviderKind::Mach, &event)
            .unwrap()
            .unwrap();
        assert_eq!(first.state, TransactionState::Rejected);

        // A redelivered notification, even with a different verdict,
        // leaves the stored outcome alone.
        let contradicting = WebhookEvent {
            status: "approved".to_string(),
            ..event
        };
        let replay = process_notification(&ledger, ProviderKind::Mach, &contradicting)
            .unwrap()
            .unwrap();
        assert_eq!(replay.state, TransactionState::Rejected);
    }

    #[test]
    fn test_unsettled_notification_applies_nothing() {
        let ledger = seeded_ledger();
        let event = WebhookEvent {
            order_id: Some("ORD-1".to_string()),
            token: None,
            status: "pending".to_string(),
            amount: None,
            authorization_code: None,
        };

        let applied = process_notification(&ledger, ProviderKind::Mach, &event).unwrap();
        assert!(applied.is_none());
        assert_eq!(
            ledger.get("ORD-1").unwrap().state,
            TransactionState::Initiated
        );
    }

    #[test]
    fn test_notification_for_unknown_transaction() {
        let ledger = seeded_ledger();
        let event = WebhookEvent {
            order_id: Some("ORD-ghost".to_string()),
            token: None,
            status: "approved".to_string(),
            amount: None,
            authorization_code: None,
        };
        assert!(matches!(
            process_notification(&ledger, ProviderKind::Mach, &event).unwrap_err(),
            WebhookError::UnknownTransaction
        ));
    }

    #[test]
    fn test_notification_provider_mismatch_rejected() {
        let ledger = seeded_ledger();
        let event = WebhookEvent {
            order_id: Some("ORD-1".to_string()),
            token: None,
            status: "AUTHORIZED".to_string(),
            amount: None,
            authorization_code: None,
        };
        // Row belongs to Mach; a Webpay-addressed notification must not
        // be able to finalize it.
        assert!(matches!(
            process_notification(&ledger, ProviderKind::Webpay, &event).unwrap_err(),
            WebhookError::UnknownTransaction
        ));
    }

    #[test]
    fn test_notification_without_any_reference() {
        let ledger = seeded_ledger();
        let event = WebhookEvent {
            order_id: None,
            token: None,
            status: "approved".to_string(),
            amount: None,
            authorization_code: None,
        };
        assert!(matches!(
            process_notification(&ledger, ProviderKind::Mach, &event).unwrap_err(),
            WebhookError::InvalidPayload(_)
        ));
    }
}
