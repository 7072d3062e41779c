//! Course purchase repository port.

use async_trait::async_trait;

use crate::domain::billing::CoursePurchase;
use crate::domain::foundation::DomainError;

/// Repository port for standalone course purchases.
#[async_trait]
pub trait CoursePurchaseRepository: Send + Sync {
    /// Find a purchase by the Korvex transaction id stored at checkout.
    async fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<CoursePurchase>, DomainError>;

    /// Update `payment_status`, `is_active` and `purchased_at`.
    ///
    /// # Errors
    ///
    /// - `CoursePurchaseNotFound` if it doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, purchase: &CoursePurchase) -> Result<(), DomainError>;
}
