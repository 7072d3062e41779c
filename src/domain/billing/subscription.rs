//! Subscription record and its lifecycle.
//!
//! A user holds at most one subscription row. Payments extend it, refunds
//! cancel it. The current period end only ever moves forward, which makes
//! every replayed renewal a no-op.

use serde::{Deserialize, Serialize};

use super::interval::BillingPeriod;
use crate::domain::foundation::{
    PlanId, StateMachine, SubscriptionId, Timestamp, UserId, ValidationError,
};

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Free trial before the first settled payment.
    Trial,

    /// Paid and within the current period.
    Active,

    /// Renewal failed; Korvex is retrying.
    PastDue,

    /// Canceled by refund.
    Canceled,

    /// Ended elsewhere. Never produced by the webhook.
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From TRIAL
            (Trial, Active)
                | (Trial, Canceled)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, Canceled)
            // From PAST_DUE
                | (PastDue, Active)
                | (PastDue, Canceled)
            // From CANCELED
                | (Canceled, Canceled) // Replayed refund
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Trial => vec![Active, Canceled],
            Active => vec![Active, Canceled],
            PastDue => vec![Active, Canceled],
            Canceled => vec![Canceled],
            Expired => vec![],
        }
    }
}

/// Persisted subscription record.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub trial_ends_at: Option<Timestamp>,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates an active subscription for a user who paid without one.
    pub fn start_active(
        id: SubscriptionId,
        user_id: UserId,
        plan_id: PlanId,
        period: BillingPeriod,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            plan_id,
            status: SubscriptionStatus::Active,
            trial_ends_at: None,
            current_period_start: Some(period.start),
            current_period_end: Some(period.end),
            canceled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Activates or renews the subscription for a settled payment.
    ///
    /// Leaving trial stamps `trial_ends_at`. The period is replaced only when
    /// its end is later than the stored end.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the current status cannot become active.
    pub fn activate(&mut self, period: BillingPeriod, now: Timestamp) -> Result<(), ValidationError> {
        let was_trial = self.status == SubscriptionStatus::Trial;
        self.status = self.status.transition_to(SubscriptionStatus::Active)?;
        if was_trial {
            self.trial_ends_at = Some(now);
        }
        self.extend_period(period);
        self.updated_at = now;
        Ok(())
    }

    /// Puts the subscription back on `plan_id` after a payment with no linked
    /// subscription. Overwrites status regardless of the previous one.
    pub fn resubscribe(&mut self, plan_id: PlanId, period: BillingPeriod, now: Timestamp) {
        self.plan_id = plan_id;
        self.status = SubscriptionStatus::Active;
        self.canceled_at = None;
        self.extend_period(period);
        self.updated_at = now;
    }

    /// Cancels the subscription after a refund.
    ///
    /// Canceling again keeps the original `canceled_at`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the subscription already expired.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        if self.status == SubscriptionStatus::Canceled && self.canceled_at.is_some() {
            return Ok(());
        }
        self.status = self.status.transition_to(SubscriptionStatus::Canceled)?;
        self.canceled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// End of the current period, if any.
    pub fn access_until(&self) -> Option<Timestamp> {
        self.current_period_end
    }

    fn extend_period(&mut self, period: BillingPeriod) {
        let moves_forward = match self.current_period_end {
            Some(stored_end) => period.end.is_after(&stored_end),
            None => true,
        };
        if moves_forward {
            self.current_period_start = Some(period.start);
            self.current_period_end = Some(period.end);
        }
    }
}
