//! User access port.
//!
//! Covers the only parts of the user entity this service touches: the
//! entitlement fields and the contact details used for receipts.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp, UserId};

/// Name and email of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContact {
    pub name: Option<String>,
    pub email: String,
}

/// Port for user entitlement fields.
#[async_trait]
pub trait UserAccessRepository: Send + Sync {
    /// Sets `access_expires_at` and clears `allowed_courses`.
    ///
    /// Blind overwrite; prior values are not merged.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn grant_subscription_access(
        &self,
        user_id: &UserId,
        expires_at: Timestamp,
    ) -> Result<(), DomainError>;

    /// Contact details for notifications. Returns `None` if the user is unknown.
    async fn find_contact(&self, user_id: &UserId) -> Result<Option<UserContact>, DomainError>;
}
