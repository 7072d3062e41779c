//! Payment repository port.
//!
//! Payments are created by checkout. The webhook only looks them up by the
//! Korvex keys and writes back status changes.

use async_trait::async_trait;

use crate::domain::billing::Payment;
use crate::domain::foundation::DomainError;

/// Repository port for payment records.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Find a payment by Korvex transaction id (`korvex_payment_id`).
    ///
    /// Returns `None` if not found.
    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<Payment>, DomainError>;

    /// Find a payment by the secondary identifier sent at checkout.
    ///
    /// Returns `None` if not found.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Payment>, DomainError>;

    /// Update status, `paid_at`, subscription link and `updated_at`.
    ///
    /// # Errors
    ///
    /// - `PaymentNotFound` if the payment doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, payment: &Payment) -> Result<(), DomainError>;
}
