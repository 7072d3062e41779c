//! Payment record and its status state machine.
//!
//! Payments are created by checkout before Korvex ever calls back. This
//! service only moves them between statuses, stamps `paid_at`, and backfills
//! the subscription link.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::interval::{BillingInterval, IntervalUnit};
use crate::domain::foundation::{
    PaymentId, PlanId, StateMachine, SubscriptionId, Timestamp, UserId, ValidationError,
};

/// Status of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting settlement.
    Pending,

    /// Settled by Korvex.
    Confirmed,

    /// Declined. Korvex may still settle it after a retry.
    Failed,

    Canceled,

    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Pending)
                | (Pending, Confirmed)
                | (Pending, Failed)
                | (Pending, Canceled)
                | (Pending, Refunded)
            // From FAILED (retry may still settle)
                | (Failed, Failed)
                | (Failed, Pending)
                | (Failed, Confirmed)
                | (Failed, Canceled)
            // From CONFIRMED
                | (Confirmed, Confirmed)
                | (Confirmed, Canceled)
                | (Confirmed, Refunded)
            // From CANCELED
                | (Canceled, Canceled)
                | (Canceled, Refunded)
            // From REFUNDED
                | (Refunded, Refunded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Pending, Confirmed, Failed, Canceled, Refunded],
            Failed => vec![Failed, Pending, Confirmed, Canceled],
            Confirmed => vec![Confirmed, Canceled, Refunded],
            Canceled => vec![Canceled, Refunded],
            Refunded => vec![Refunded],
        }
    }
}

/// Persisted payment record.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    /// Korvex transaction id.
    pub korvex_payment_id: String,
    /// Secondary identifier sent by checkout.
    pub korvex_identifier: Option<String>,
    pub subscription_id: Option<SubscriptionId>,
    pub status: PaymentStatus,
    pub paid_at: Option<Timestamp>,
    /// Free-form checkout metadata.
    pub metadata: Option<Value>,
    pub updated_at: Timestamp,
}

impl Payment {
    /// Creates a pending payment, as checkout would.
    pub fn pending(id: PaymentId, korvex_payment_id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            korvex_payment_id: korvex_payment_id.into(),
            korvex_identifier: None,
            subscription_id: None,
            status: PaymentStatus::Pending,
            paid_at: None,
            metadata: None,
            updated_at: now,
        }
    }

    /// Moves the payment to `target`.
    ///
    /// Returns `Ok(false)` when the payment already holds `target`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when the transition is not allowed, which
    /// means the event arrived out of order.
    pub fn transition_to(
        &mut self,
        target: PaymentStatus,
        now: Timestamp,
    ) -> Result<bool, ValidationError> {
        let next = self.status.transition_to(target)?;
        if next == self.status {
            return Ok(false);
        }
        self.status = next;
        self.updated_at = now;
        Ok(true)
    }

    /// Marks the payment settled.
    ///
    /// `paid_at` comes from Korvex when present. A replay without it keeps the
    /// stamp recorded the first time.
    pub fn confirm(
        &mut self,
        paid_at: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<bool, ValidationError> {
        let status = self.status.transition_to(PaymentStatus::Confirmed)?;
        let paid_at = paid_at.or(self.paid_at).unwrap_or(now);
        if self.status == status && self.paid_at == Some(paid_at) {
            return Ok(false);
        }
        self.status = status;
        self.paid_at = Some(paid_at);
        self.updated_at = now;
        Ok(true)
    }

    /// Links the payment to a subscription. Returns `false` if already linked to it.
    pub fn link_subscription(&mut self, subscription_id: SubscriptionId, now: Timestamp) -> bool {
        if self.subscription_id.as_ref() == Some(&subscription_id) {
            return false;
        }
        self.subscription_id = Some(subscription_id);
        self.updated_at = now;
        true
    }

    /// Billing interval recorded at checkout, if any.
    pub fn metadata_interval(&self) -> Option<BillingInterval> {
        let metadata = metadata_object(self.metadata.as_ref()?)?;
        let unit = string_field(&metadata, &["intervalType", "interval_type"])?;
        let count = integer_field(&metadata, &["intervalCount", "interval_count"]).unwrap_or(1);
        BillingInterval::new(IntervalUnit::from(unit), count).ok()
    }

    /// Plan and user recorded at checkout, if both are present.
    pub fn subscription_intent(&self) -> Option<SubscriptionIntent> {
        let metadata = metadata_object(self.metadata.as_ref()?)?;
        let plan_id = string_field(&metadata, &["planId", "plan_id"])?;
        let user_id = string_field(&metadata, &["userId", "user_id"])?;
        Some(SubscriptionIntent {
            plan_id: PlanId::new(plan_id).ok()?,
            user_id: UserId::new(user_id).ok()?,
        })
    }
}

/// Plan and user recovered from payment metadata, used when a paid payment
/// has no subscription yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionIntent {
    pub plan_id: PlanId,
    pub user_id: UserId,
}

/// Checkout stores metadata either as a JSON object or as a JSON-encoded string.
fn metadata_object(metadata: &Value) -> Option<serde_json::Map<String, Value>> {
    match metadata {
        Value::Object(map) => Some(map.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

fn string_field(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn integer_field(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}
