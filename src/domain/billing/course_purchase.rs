//! Standalone course purchase.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CourseId, CoursePurchaseId, StateMachine, Timestamp, UserId, ValidationError,
};

/// Payment status of a course purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
        }
    }
}

impl StateMachine for PurchaseStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, target),
            (Pending, Completed)
                | (Pending, Failed)
                | (Failed, Completed) // Retried payment settled
                | (Failed, Failed)
                | (Completed, Completed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PurchaseStatus::*;
        match self {
            Pending => vec![Completed, Failed],
            Failed => vec![Completed, Failed],
            Completed => vec![Completed],
        }
    }
}

/// Persisted course purchase. Created at checkout, finalized by Korvex events.
#[derive(Debug, Clone, PartialEq)]
pub struct CoursePurchase {
    pub id: CoursePurchaseId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub korvex_payment_id: String,
    pub payment_status: PurchaseStatus,
    pub is_active: bool,
    pub purchased_at: Option<Timestamp>,
}

impl CoursePurchase {
    /// Marks the purchase paid and grants the course.
    ///
    /// Returns `Ok(false)` when it was already completed.
    pub fn complete(&mut self, paid_at: Option<Timestamp>, now: Timestamp) -> Result<bool, ValidationError> {
        if self.payment_status == PurchaseStatus::Completed {
            return Ok(false);
        }
        self.payment_status = self.payment_status.transition_to(PurchaseStatus::Completed)?;
        self.is_active = true;
        self.purchased_at = Some(paid_at.unwrap_or(now));
        Ok(true)
    }

    /// Marks the purchase failed.
    ///
    /// Returns `Ok(false)` when it had already failed.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for a completed purchase.
    pub fn fail(&mut self) -> Result<bool, ValidationError> {
        if self.payment_status == PurchaseStatus::Failed {
            return Ok(false);
        }
        self.payment_status = self.payment_status.transition_to(PurchaseStatus::Failed)?;
        Ok(true)
    }
}
