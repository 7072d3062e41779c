//! Subscription repository port.
//!
//! At most one subscription exists per user; `save` relies on a unique
//! constraint on `user_id` to keep it that way.

use async_trait::async_trait;

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};

/// Repository port for subscription records.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by its id.
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Find the subscription of a user.
    ///
    /// This is the lookup used before creating one, since each user has at most one.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError>;

    /// Insert a new subscription.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the user already has a subscription
    /// - `DatabaseError` on persistence failure
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Update an existing subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if it doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError>;
}
