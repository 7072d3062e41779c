//! AccessCascade - Projects an active subscription onto user entitlements.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::UserAccessRepository;

/// Writes subscription access onto the user.
///
/// Sets `access_expires_at` to the period end and clears the per-course
/// allow-list, since a subscription grants every course. This is a blind
/// overwrite and is never merged with earlier values.
///
/// A subscription whose user row is gone is still recorded; the missing
/// user is logged and skipped so the provider stops redelivering.
pub struct AccessCascade {
    users: Arc<dyn UserAccessRepository>,
}

impl AccessCascade {
    pub fn new(users: Arc<dyn UserAccessRepository>) -> Self {
        Self { users }
    }

    pub async fn apply(&self, user_id: &UserId, expires_at: Timestamp) -> Result<(), DomainError> {
        match self.users.grant_subscription_access(user_id, expires_at).await {
            Ok(()) => {}
            Err(e) if e.code == ErrorCode::UserNotFound => {
                tracing::warn!(
                    user_id = %user_id,
                    "User not found, subscription access not cascaded"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            user_id = %user_id,
            access_expires_at = %expires_at.to_rfc3339(),
            "Granted subscription access"
        );
        Ok(())
    }
}
