use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

pub mod mock;

pub use mock::MockGateway;

/// Identifier returned by the gateway for a successful capture; stored on the
/// order so a retry can be distinguished from a second charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureId(pub String);

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Terminal for the attempt; the order stays pending and the caller must
    /// cancel or retry with new payment details.
    #[error("declined: {0}")]
    Declined(String),

    /// Retryable; nothing was charged and no state changed.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined(reason) => AppError::PaymentDeclined(reason),
            PaymentError::Unavailable(reason) => AppError::GatewayUnavailable(reason),
        }
    }
}

/// Boundary to the external payment processor. The service layer only ever
/// sees this trait; tests and local runs wire in [`MockGateway`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Capture `amount` for the given order. `order_id` is passed as the
    /// idempotency reference: a retried capture for the same order must not
    /// produce a second charge, even if two callers race past the status
    /// check.
    async fn capture(
        &self,
        order_id: Uuid,
        amount: i64,
        currency: &str,
        payment_token: &str,
    ) -> Result<CaptureId, PaymentError>;
}
