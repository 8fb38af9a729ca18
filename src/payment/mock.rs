use async_trait::async_trait;
use uuid::Uuid;

use super::{CaptureId, PaymentError, PaymentGateway};

/// Deterministic stand-in gateway. Behavior is selected by token prefix so
/// tests and local runs can exercise every outcome:
/// `tok_declined*` declines, `tok_offline*` reports the gateway unreachable,
/// anything else captures. The capture id is derived from the order id, so a
/// retried capture hands back the same id instead of charging again.
#[derive(Debug, Default, Clone)]
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn capture(
        &self,
        order_id: Uuid,
        amount: i64,
        currency: &str,
        payment_token: &str,
    ) -> Result<CaptureId, PaymentError> {
        if payment_token.starts_with("tok_declined") {
            return Err(PaymentError::Declined("card declined".into()));
        }
        if payment_token.starts_with("tok_offline") {
            return Err(PaymentError::Unavailable("gateway timeout".into()));
        }

        let capture_id = CaptureId(format!("cap_{}", order_id.simple()));
        tracing::debug!(amount, currency, capture_id = %capture_id.0, "mock capture");
        Ok(capture_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_ordinary_tokens() {
        let gateway = MockGateway;
        let capture = gateway
            .capture(Uuid::new_v4(), 1500, "usd", "tok_visa")
            .await
            .unwrap();
        assert!(capture.0.starts_with("cap_"));
    }

    #[tokio::test]
    async fn retried_capture_reuses_the_reference() {
        let gateway = MockGateway;
        let order_id = Uuid::new_v4();
        let first = gateway
            .capture(order_id, 1500, "usd", "tok_visa")
            .await
            .unwrap();
        let second = gateway
            .capture(order_id, 1500, "usd", "tok_visa")
            .await
            .unwrap();
        assert_eq!(first, second);

        let other = gateway
            .capture(Uuid::new_v4(), 1500, "usd", "tok_visa")
            .await
            .unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn declined_tokens_are_terminal() {
        let gateway = MockGateway;
        let err = gateway
            .capture(Uuid::new_v4(), 1500, "usd", "tok_declined_42")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Declined(_)));
    }

    #[tokio::test]
    async fn offline_tokens_are_retryable() {
        let gateway = MockGateway;
        let err = gateway
            .capture(Uuid::new_v4(), 1500, "usd", "tok_offline")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Unavailable(_)));
    }
}
