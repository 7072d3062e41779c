//! SubscriptionLifecycle - Applies Korvex events to payments and subscriptions.
//!
//! Every step is safe to re-apply: status guards turn replays into no-ops,
//! period ends only move forward, and the per-user unique constraint keeps a
//! second delivery from creating a second subscription.

use std::sync::Arc;

use super::{AccessCascade, WebhookOutcome};
use crate::domain::billing::{
    BillingInterval, BillingPeriod, Payment, PaymentStatus, Subscription, SubscriptionIntent,
    SubscriptionSnapshot, SubscriptionStatus, TransactionSnapshot, TransactionStatus,
};
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};
use crate::ports::{PaymentRepository, SubscriptionRepository};

/// Payment bookkeeping and subscription state changes for Korvex events.
pub struct SubscriptionLifecycle {
    payments: Arc<dyn PaymentRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    access: AccessCascade,
}

impl SubscriptionLifecycle {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        access: AccessCascade,
    ) -> Self {
        Self {
            payments,
            subscriptions,
            access,
        }
    }

    /// TRANSACTION_CREATED: the payment goes (back) to pending.
    pub async fn on_created(
        &self,
        payment: Payment,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        self.set_payment_status(payment, PaymentStatus::Pending, now)
            .await
    }

    /// TRANSACTION_CANCELED: the payment is canceled; subscriptions are untouched.
    pub async fn on_canceled(
        &self,
        payment: Payment,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        self.set_payment_status(payment, PaymentStatus::Canceled, now)
            .await
    }

    /// TRANSACTION_PAID for a payment with no course purchase.
    pub async fn on_paid(
        &self,
        payment: Payment,
        transaction: &TransactionSnapshot,
        snapshot: Option<&SubscriptionSnapshot>,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        match transaction.status {
            TransactionStatus::Completed => {
                self.on_paid_completed(payment, transaction, snapshot, now)
                    .await
            }
            TransactionStatus::Pending => {
                self.set_payment_status(payment, PaymentStatus::Pending, now)
                    .await
            }
            TransactionStatus::Failed => {
                self.set_payment_status(payment, PaymentStatus::Failed, now)
                    .await
            }
            ref other => {
                tracing::warn!(
                    payment_id = %payment.id,
                    transaction_status = %other,
                    "Paid event with unhandled transaction status, ignoring"
                );
                Ok(WebhookOutcome::Acknowledged)
            }
        }
    }

    /// TRANSACTION_REFUNDED: the payment is refunded and its subscription canceled.
    ///
    /// User access is left to lapse at the stored expiry.
    pub async fn on_refunded(
        &self,
        mut payment: Payment,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        match payment.transition_to(PaymentStatus::Refunded, now) {
            Ok(true) => self.payments.update(&payment).await?,
            Ok(false) => {}
            Err(e) => return Ok(stale(&payment, e.to_string())),
        }

        let Some(subscription_id) = payment.subscription_id.clone() else {
            return Ok(WebhookOutcome::PaymentUpdated {
                payment_id: payment.id.to_string(),
                status: payment.status,
            });
        };

        let Some(mut subscription) = self.subscriptions.find_by_id(&subscription_id).await? else {
            tracing::warn!(
                payment_id = %payment.id,
                subscription_id = %subscription_id,
                "Refunded payment links to a missing subscription"
            );
            return Ok(WebhookOutcome::PaymentUpdated {
                payment_id: payment.id.to_string(),
                status: payment.status,
            });
        };

        let canceled_at = subscription.canceled_at;
        if let Err(e) = subscription.cancel(now) {
            tracing::warn!(
                subscription_id = %subscription.id,
                status = %subscription.status.as_str(),
                error = %e,
                "Cannot cancel subscription after refund"
            );
            return Ok(WebhookOutcome::PaymentUpdated {
                payment_id: payment.id.to_string(),
                status: payment.status,
            });
        }
        if subscription.canceled_at != canceled_at {
            self.subscriptions.update(&subscription).await?;
            tracing::info!(
                payment_id = %payment.id,
                subscription_id = %subscription.id,
                user_id = %subscription.user_id,
                "Subscription canceled after refund"
            );
        }

        Ok(WebhookOutcome::SubscriptionCanceled {
            payment_id: payment.id.to_string(),
            subscription_id: subscription.id.to_string(),
        })
    }

    async fn on_paid_completed(
        &self,
        mut payment: Payment,
        transaction: &TransactionSnapshot,
        snapshot: Option<&SubscriptionSnapshot>,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        let replayed = match payment.confirm(transaction.paid_at, now) {
            Ok(true) => {
                self.payments.update(&payment).await?;
                tracing::info!(payment_id = %payment.id, "Payment confirmed");
                false
            }
            Ok(false) => true,
            Err(e) => return Ok(stale(&payment, e.to_string())),
        };

        let period = billing_period(snapshot, &payment, now)?;

        if let Some(subscription_id) = payment.subscription_id.clone() {
            match self.subscriptions.find_by_id(&subscription_id).await? {
                Some(subscription) => {
                    return self.renew_linked(payment, subscription, period, replayed, now).await;
                }
                None => {
                    tracing::warn!(
                        payment_id = %payment.id,
                        subscription_id = %subscription_id,
                        "Paid payment links to a missing subscription, trying metadata"
                    );
                }
            }
        }

        match payment.subscription_intent() {
            Some(intent) => self.subscribe_from_intent(payment, intent, period, now).await,
            None => {
                tracing::warn!(
                    payment_id = %payment.id,
                    "Paid payment has no subscription and no plan/user metadata"
                );
                Ok(WebhookOutcome::PaymentConfirmed {
                    payment_id: payment.id.to_string(),
                })
            }
        }
    }

    async fn renew_linked(
        &self,
        payment: Payment,
        mut subscription: Subscription,
        period: BillingPeriod,
        replayed: bool,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        // A period counted from `now` would drift forward on every redelivery.
        if replayed
            && subscription.status == SubscriptionStatus::Active
            && subscription.access_until().is_some()
        {
            tracing::debug!(
                payment_id = %payment.id,
                subscription_id = %subscription.id,
                "Paid event replayed, keeping stored period"
            );
            return self.finish_activation(payment, subscription, false).await;
        }

        if let Err(e) = subscription.activate(period, now) {
            tracing::warn!(
                payment_id = %payment.id,
                subscription_id = %subscription.id,
                status = %subscription.status.as_str(),
                error = %e,
                "Invalid subscription transition on paid event"
            );
            return Ok(WebhookOutcome::PaymentConfirmed {
                payment_id: payment.id.to_string(),
            });
        }

        self.subscriptions.update(&subscription).await?;
        self.finish_activation(payment, subscription, false).await
    }

    async fn subscribe_from_intent(
        &self,
        mut payment: Payment,
        intent: SubscriptionIntent,
        period: BillingPeriod,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        let (subscription, created) = match self.subscriptions.find_by_user_id(&intent.user_id).await? {
            Some(existing) => (self.overwrite(existing, &intent, period, now).await?, false),
            None => {
                let subscription = Subscription::start_active(
                    SubscriptionId::generate(),
                    intent.user_id.clone(),
                    intent.plan_id.clone(),
                    period,
                    now,
                );
                match self.subscriptions.save(&subscription).await {
                    Ok(()) => (subscription, true),
                    Err(e) if e.is_conflict() => {
                        // A concurrent delivery created it first.
                        let winner = self
                            .subscriptions
                            .find_by_user_id(&intent.user_id)
                            .await?
                            .ok_or(e)?;
                        (self.overwrite(winner, &intent, period, now).await?, false)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        if payment.link_subscription(subscription.id.clone(), now) {
            self.payments.update(&payment).await?;
        }

        self.finish_activation(payment, subscription, created).await
    }

    async fn overwrite(
        &self,
        mut subscription: Subscription,
        intent: &SubscriptionIntent,
        period: BillingPeriod,
        now: Timestamp,
    ) -> Result<Subscription, DomainError> {
        subscription.resubscribe(intent.plan_id.clone(), period, now);
        self.subscriptions.update(&subscription).await?;
        Ok(subscription)
    }

    async fn finish_activation(
        &self,
        payment: Payment,
        subscription: Subscription,
        created: bool,
    ) -> Result<WebhookOutcome, DomainError> {
        let period_end = subscription
            .access_until()
            .ok_or_else(|| DomainError::validation("current_period_end", "Active subscription has no period end"))?;

        self.access.apply(&subscription.user_id, period_end).await?;

        tracing::info!(
            payment_id = %payment.id,
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            period_end = %period_end.to_rfc3339(),
            created,
            "Subscription active"
        );

        Ok(WebhookOutcome::SubscriptionActivated {
            payment_id: payment.id.to_string(),
            subscription_id: subscription.id.to_string(),
            user_id: subscription.user_id.to_string(),
            period_end,
            created,
        })
    }

    async fn set_payment_status(
        &self,
        mut payment: Payment,
        target: PaymentStatus,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        match payment.transition_to(target, now) {
            Ok(true) => {
                self.payments.update(&payment).await?;
                tracing::info!(payment_id = %payment.id, status = %target.as_str(), "Payment status updated");
            }
            Ok(false) => {
                tracing::debug!(payment_id = %payment.id, status = %target.as_str(), "Payment already in status");
            }
            Err(e) => return Ok(stale(&payment, e.to_string())),
        }
        Ok(WebhookOutcome::PaymentUpdated {
            payment_id: payment.id.to_string(),
            status: payment.status,
        })
    }
}

/// Picks the billing period for a settled payment.
///
/// In order: the envelope's subscription interval from its start, the
/// checkout metadata interval from `now`, one calendar month from `now`.
pub fn billing_period(
    snapshot: Option<&SubscriptionSnapshot>,
    payment: &Payment,
    now: Timestamp,
) -> Result<BillingPeriod, DomainError> {
    if let Some(snapshot) = snapshot {
        let period = BillingInterval::new(snapshot.interval_type.clone(), snapshot.interval_count)
            .and_then(|interval| interval.period_from(snapshot.start_at));
        match period {
            Ok(period) => return Ok(period),
            Err(e) => tracing::warn!(
                subscription = %snapshot.id,
                error = %e,
                "Unusable subscription interval in envelope, falling back"
            ),
        }
    }

    if let Some(interval) = payment.metadata_interval() {
        if let Ok(period) = interval.period_from(now) {
            return Ok(period);
        }
    }

    Ok(BillingInterval::monthly().period_from(now)?)
}

fn stale(payment: &Payment, reason: String) -> WebhookOutcome {
    tracing::info!(
        payment_id = %payment.id,
        status = %payment.status.as_str(),
        reason = %reason,
        "Stale event for payment, ignoring"
    );
    WebhookOutcome::Stale {
        record_id: payment.id.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryBillingStore, UserRecord};
    use crate::domain::billing::TransactionEvent;
    use crate::domain::foundation::{CourseId, ErrorCode, PaymentId, PlanId, UserId};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn ts(value: &str) -> Timestamp {
        Timestamp::parse_rfc3339(value).unwrap()
    }

    fn paid_event(status: &str, with_snapshot: bool) -> TransactionEvent {
        let snapshot = if with_snapshot {
            r#", "subscription": { "id": "s1", "startAt": "2024-03-01T00:00:00Z",
                                   "intervalType": "MONTHS", "intervalCount": 1 }"#
        } else {
            ""
        };
        let json = format!(
            r#"{{ "event": "TRANSACTION_PAID",
                  "transaction": {{ "id": "tx1", "status": "{}", "paymentMethod": "PIX",
                                    "payedAt": "2024-03-01T00:00:00Z" }}{} }}"#,
            status, snapshot
        );
        TransactionEvent::from_slice(json.as_bytes()).unwrap()
    }

    fn payment(status: PaymentStatus, subscription_id: Option<&str>) -> Payment {
        let mut payment = Payment::pending(
            PaymentId::new("p1").unwrap(),
            "tx1",
            ts("2024-02-29T23:00:00Z"),
        );
        payment.status = status;
        payment.subscription_id = subscription_id.map(|id| SubscriptionId::new(id).unwrap());
        payment
    }

    fn subscription(status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: SubscriptionId::new("sub1").unwrap(),
            user_id: UserId::new("u1").unwrap(),
            plan_id: PlanId::new("plan-pro").unwrap(),
            status,
            trial_ends_at: None,
            current_period_start: None,
            current_period_end: None,
            canceled_at: None,
            created_at: ts("2024-02-01T00:00:00Z"),
            updated_at: ts("2024-02-01T00:00:00Z"),
        }
    }

    fn setup() -> (Arc<InMemoryBillingStore>, SubscriptionLifecycle) {
        let store = Arc::new(InMemoryBillingStore::new());
        store.insert_user(
            &UserId::new("u1").unwrap(),
            UserRecord::new("ana@example.com")
                .with_allowed_courses(vec![CourseId::new("c1").unwrap()]),
        );
        let lifecycle = SubscriptionLifecycle::new(
            store.clone(),
            store.clone(),
            AccessCascade::new(store.clone()),
        );
        (store, lifecycle)
    }

    async fn pay(
        store: &InMemoryBillingStore,
        lifecycle: &SubscriptionLifecycle,
        event: &TransactionEvent,
        now: Timestamp,
    ) -> WebhookOutcome {
        let payment = store.payment("p1").unwrap();
        lifecycle
            .on_paid(payment, &event.transaction, event.subscription.as_ref(), now)
            .await
            .unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Period selection
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn period_prefers_envelope_snapshot() {
        let event = paid_event("COMPLETED", true);
        let mut p = payment(PaymentStatus::Pending, None);
        p.metadata = Some(json!({ "intervalType": "YEARS", "intervalCount": 1 }));

        let period = billing_period(event.subscription.as_ref(), &p, ts("2024-03-05T00:00:00Z")).unwrap();

        assert_eq!(period.start, ts("2024-03-01T00:00:00Z"));
        assert_eq!(period.end, ts("2024-04-01T00:00:00Z"));
    }

    #[test]
    fn period_falls_back_to_metadata_from_now() {
        let mut p = payment(PaymentStatus::Pending, None);
        p.metadata = Some(json!({ "intervalType": "WEEKS", "intervalCount": 2 }));
        let now = ts("2024-03-05T10:00:00Z");

        let period = billing_period(None, &p, now).unwrap();

        assert_eq!(period.start, now);
        assert_eq!(period.end, ts("2024-03-19T10:00:00Z"));
    }

    #[test]
    fn period_defaults_to_one_month_from_now() {
        let p = payment(PaymentStatus::Pending, None);
        let now = ts("2024-01-31T08:00:00Z");

        let period = billing_period(None, &p, now).unwrap();

        assert_eq!(period.end, ts("2024-02-29T08:00:00Z"));
    }

    #[test]
    fn unusable_snapshot_interval_falls_back() {
        let json = r#"{ "event": "TRANSACTION_PAID",
            "transaction": { "id": "tx1", "status": "COMPLETED", "paymentMethod": "PIX" },
            "subscription": { "id": "s1", "startAt": "2024-03-01T00:00:00Z",
                              "intervalType": "FORTNIGHTS", "intervalCount": 1 } }"#;
        let event = TransactionEvent::from_slice(json.as_bytes()).unwrap();
        let now = ts("2024-03-10T00:00:00Z");

        let period = billing_period(event.subscription.as_ref(), &payment(PaymentStatus::Pending, None), now).unwrap();

        assert_eq!(period.start, now);
        assert_eq!(period.end, ts("2024-04-10T00:00:00Z"));
    }

    // ══════════════════════════════════════════════════════════════
    // Paid: linked subscription
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn paid_activates_trial_subscription() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, Some("sub1")));
        store.insert_subscription(subscription(SubscriptionStatus::Trial));
        let now = ts("2024-03-01T00:00:05Z");

        let outcome = pay(&store, &lifecycle, &paid_event("COMPLETED", true), now).await;

        assert!(matches!(
            outcome,
            WebhookOutcome::SubscriptionActivated { created: false, .. }
        ));
        let sub = store.subscription("sub1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.trial_ends_at, Some(now));
        assert_eq!(sub.current_period_end, Some(ts("2024-04-01T00:00:00Z")));

        let payment = store.payment("p1").unwrap();
        assert_eq!(payment.status, PaymentStatus::Confirmed);
        assert_eq!(payment.paid_at, Some(ts("2024-03-01T00:00:00Z")));

        let user = store.user("u1").unwrap();
        assert_eq!(user.access_expires_at, Some(ts("2024-04-01T00:00:00Z")));
        assert_eq!(user.allowed_courses, None);
    }

    #[tokio::test]
    async fn redelivered_paid_event_keeps_period_end() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, Some("sub1")));
        store.insert_subscription(subscription(SubscriptionStatus::Trial));
        let event = paid_event("COMPLETED", true);

        pay(&store, &lifecycle, &event, ts("2024-03-01T00:00:05Z")).await;
        let first = store.subscription("sub1").unwrap();
        pay(&store, &lifecycle, &event, ts("2024-03-01T00:07:00Z")).await;
        let second = store.subscription("sub1").unwrap();

        assert_eq!(first.current_period_end, second.current_period_end);
        assert_eq!(first.current_period_start, second.current_period_start);
        assert_eq!(first.trial_ends_at, second.trial_ends_at);
        assert!(second.current_period_end.unwrap().is_after(&second.current_period_start.unwrap()));
    }

    #[tokio::test]
    async fn paid_on_canceled_subscription_confirms_payment_only() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, Some("sub1")));
        store.insert_subscription(subscription(SubscriptionStatus::Canceled));

        let outcome = pay(&store, &lifecycle, &paid_event("COMPLETED", true), Timestamp::now()).await;

        assert!(matches!(outcome, WebhookOutcome::PaymentConfirmed { .. }));
        assert_eq!(store.payment("p1").unwrap().status, PaymentStatus::Confirmed);
        assert_eq!(store.subscription("sub1").unwrap().status, SubscriptionStatus::Canceled);
        assert_eq!(store.user("u1").unwrap().access_expires_at, None);
    }

    #[tokio::test]
    async fn paid_after_refund_is_stale() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Refunded, Some("sub1")));
        store.insert_subscription(subscription(SubscriptionStatus::Canceled));
        let writes = store.write_count();

        let outcome = pay(&store, &lifecycle, &paid_event("COMPLETED", true), Timestamp::now()).await;

        assert!(matches!(outcome, WebhookOutcome::Stale { .. }));
        assert_eq!(store.write_count(), writes);
    }

    // ══════════════════════════════════════════════════════════════
    // Paid: subscription from metadata
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn paid_creates_subscription_from_metadata_once() {
        let (store, lifecycle) = setup();
        let mut p = payment(PaymentStatus::Pending, None);
        p.metadata = Some(json!({ "planId": "plan-pro", "userId": "u1" }));
        store.insert_payment(p);
        let event = paid_event("COMPLETED", true);

        let outcome = pay(&store, &lifecycle, &event, Timestamp::now()).await;
        let WebhookOutcome::SubscriptionActivated { subscription_id, created, .. } = outcome else {
            panic!("expected activation");
        };
        assert!(created);

        pay(&store, &lifecycle, &event, Timestamp::now()).await;

        let subs = store.subscriptions_for_user("u1");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id.as_str(), subscription_id);
        assert_eq!(subs[0].plan_id.as_str(), "plan-pro");
        assert_eq!(subs[0].status, SubscriptionStatus::Active);
        assert_eq!(
            store.payment("p1").unwrap().subscription_id.unwrap().as_str(),
            subscription_id
        );
    }

    #[tokio::test]
    async fn paid_overwrites_existing_subscription_for_user() {
        let (store, lifecycle) = setup();
        let mut existing = subscription(SubscriptionStatus::Canceled);
        existing.canceled_at = Some(ts("2024-02-10T00:00:00Z"));
        store.insert_subscription(existing);
        let mut p = payment(PaymentStatus::Pending, None);
        p.metadata = Some(json!({ "planId": "plan-max", "userId": "u1" }));
        store.insert_payment(p);

        pay(&store, &lifecycle, &paid_event("COMPLETED", true), Timestamp::now()).await;

        let sub = store.subscription("sub1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan_id.as_str(), "plan-max");
        assert_eq!(sub.canceled_at, None);
        assert_eq!(store.subscriptions_for_user("u1").len(), 1);
        assert_eq!(
            store.payment("p1").unwrap().subscription_id,
            Some(SubscriptionId::new("sub1").unwrap())
        );
    }

    #[tokio::test]
    async fn paid_without_link_or_metadata_confirms_only() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, None));

        let outcome = pay(&store, &lifecycle, &paid_event("COMPLETED", false), Timestamp::now()).await;

        assert!(matches!(outcome, WebhookOutcome::PaymentConfirmed { .. }));
        assert!(store.subscriptions_for_user("u1").is_empty());
    }

    #[tokio::test]
    async fn paid_for_missing_user_still_activates_once() {
        let (store, lifecycle) = setup();
        let mut p = payment(PaymentStatus::Pending, None);
        p.metadata = Some(json!({ "planId": "plan-pro", "userId": "ghost" }));
        store.insert_payment(p);
        let event = paid_event("COMPLETED", true);

        let first = pay(&store, &lifecycle, &event, ts("2024-03-01T00:00:05Z")).await;
        let second = pay(&store, &lifecycle, &event, ts("2024-03-01T00:05:00Z")).await;

        assert!(matches!(first, WebhookOutcome::SubscriptionActivated { created: true, .. }));
        assert!(matches!(second, WebhookOutcome::SubscriptionActivated { created: false, .. }));
        assert_eq!(store.subscriptions_for_user("ghost").len(), 1);
        assert_eq!(store.payment("p1").unwrap().status, PaymentStatus::Confirmed);
        assert!(store.user("ghost").is_none());
    }

    #[tokio::test]
    async fn replayed_paid_without_snapshot_keeps_period() {
        let (store, lifecycle) = setup();
        let mut p = payment(PaymentStatus::Pending, None);
        p.metadata = Some(json!({
            "planId": "plan-pro", "userId": "u1", "intervalType": "DAYS", "intervalCount": 30
        }));
        store.insert_payment(p);
        let event = paid_event("COMPLETED", false);

        pay(&store, &lifecycle, &event, ts("2024-03-01T00:00:05Z")).await;
        let first = store.subscriptions_for_user("u1").remove(0);
        let outcome = pay(&store, &lifecycle, &event, ts("2024-03-03T12:00:00Z")).await;
        let second = store.subscriptions_for_user("u1").remove(0);

        assert!(matches!(outcome, WebhookOutcome::SubscriptionActivated { created: false, .. }));
        assert_eq!(first.current_period_end, Some(ts("2024-03-31T00:00:05Z")));
        assert_eq!(second, first);
        assert_eq!(store.user("u1").unwrap().access_expires_at, first.current_period_end);
    }

    // ══════════════════════════════════════════════════════════════
    // Paid: concurrent creation
    // ══════════════════════════════════════════════════════════════

    /// Another delivery inserts the user's subscription between our lookup and insert.
    struct RacingSubscriptions {
        lookups: Mutex<u32>,
        saves: Mutex<u32>,
        row: Mutex<Subscription>,
    }

    impl RacingSubscriptions {
        fn new(winner: Subscription) -> Self {
            Self {
                lookups: Mutex::new(0),
                saves: Mutex::new(0),
                row: Mutex::new(winner),
            }
        }
    }

    #[async_trait]
    impl SubscriptionRepository for RacingSubscriptions {
        async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
            let row = self.row.lock().unwrap().clone();
            Ok((&row.id == id).then_some(row))
        }

        async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
            let first_lookup = {
                let mut lookups = self.lookups.lock().unwrap();
                *lookups += 1;
                *lookups == 1
            };
            if first_lookup {
                return Ok(None);
            }
            let row = self.row.lock().unwrap().clone();
            Ok((&row.user_id == user_id).then_some(row))
        }

        async fn save(&self, _subscription: &Subscription) -> Result<(), DomainError> {
            *self.saves.lock().unwrap() += 1;
            Err(DomainError::new(ErrorCode::Conflict, "User already has a subscription"))
        }

        async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
            *self.row.lock().unwrap() = subscription.clone();
            Ok(())
        }
    }

    #[tokio::test]
    async fn insert_conflict_overwrites_winning_subscription() {
        let store = Arc::new(InMemoryBillingStore::new());
        store.insert_user(&UserId::new("u1").unwrap(), UserRecord::new("ana@example.com"));
        let mut winner = subscription(SubscriptionStatus::Trial);
        winner.plan_id = PlanId::new("plan-basic").unwrap();
        let subscriptions = Arc::new(RacingSubscriptions::new(winner));
        let lifecycle = SubscriptionLifecycle::new(
            store.clone(),
            subscriptions.clone(),
            AccessCascade::new(store.clone()),
        );
        let mut p = payment(PaymentStatus::Pending, None);
        p.metadata = Some(json!({ "planId": "plan-pro", "userId": "u1" }));
        store.insert_payment(p);

        let outcome = pay(&store, &lifecycle, &paid_event("COMPLETED", true), ts("2024-03-01T00:00:05Z")).await;

        let WebhookOutcome::SubscriptionActivated { subscription_id, created, .. } = outcome else {
            panic!("expected activation");
        };
        assert!(!created);
        assert_eq!(subscription_id, "sub1");
        assert_eq!(*subscriptions.saves.lock().unwrap(), 1);

        let row = subscriptions.row.lock().unwrap().clone();
        assert_eq!(row.id.as_str(), "sub1");
        assert_eq!(row.status, SubscriptionStatus::Active);
        assert_eq!(row.plan_id.as_str(), "plan-pro");
        assert_eq!(row.current_period_end, Some(ts("2024-04-01T00:00:00Z")));

        assert_eq!(
            store.payment("p1").unwrap().subscription_id,
            Some(SubscriptionId::new("sub1").unwrap())
        );
        assert_eq!(
            store.user("u1").unwrap().access_expires_at,
            Some(ts("2024-04-01T00:00:00Z"))
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Paid: pending / failed
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn paid_failed_marks_payment_failed() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, Some("sub1")));
        store.insert_subscription(subscription(SubscriptionStatus::Active));

        let outcome = pay(&store, &lifecycle, &paid_event("FAILED", true), Timestamp::now()).await;

        assert!(matches!(
            outcome,
            WebhookOutcome::PaymentUpdated { status: PaymentStatus::Failed, .. }
        ));
        assert_eq!(store.subscription("sub1").unwrap(), subscription(SubscriptionStatus::Active));
    }

    #[tokio::test]
    async fn paid_pending_keeps_pending_payment_untouched() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, None));
        let writes = store.write_count();

        pay(&store, &lifecycle, &paid_event("PENDING", false), Timestamp::now()).await;

        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn paid_with_unhandled_status_is_acknowledged() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, None));

        let outcome = pay(&store, &lifecycle, &paid_event("REFUNDED", false), Timestamp::now()).await;

        assert!(matches!(outcome, WebhookOutcome::Acknowledged));
        assert_eq!(store.payment("p1").unwrap().status, PaymentStatus::Pending);
    }

    // ══════════════════════════════════════════════════════════════
    // Refunded / created / canceled
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn refund_cancels_subscription_but_keeps_access() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Confirmed, Some("sub1")));
        let mut active = subscription(SubscriptionStatus::Active);
        active.current_period_end = Some(ts("2024-04-01T00:00:00Z"));
        store.insert_subscription(active);
        let access_before = store.user("u1").unwrap();
        let now = ts("2024-03-10T00:00:00Z");

        let outcome = lifecycle
            .on_refunded(store.payment("p1").unwrap(), now)
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::SubscriptionCanceled { .. }));
        assert_eq!(store.payment("p1").unwrap().status, PaymentStatus::Refunded);
        let sub = store.subscription("sub1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.canceled_at, Some(now));
        assert_eq!(store.user("u1").unwrap(), access_before);
    }

    #[tokio::test]
    async fn replayed_refund_keeps_cancellation_time() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Confirmed, Some("sub1")));
        store.insert_subscription(subscription(SubscriptionStatus::Active));

        lifecycle
            .on_refunded(store.payment("p1").unwrap(), ts("2024-03-10T00:00:00Z"))
            .await
            .unwrap();
        lifecycle
            .on_refunded(store.payment("p1").unwrap(), ts("2024-03-11T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(
            store.subscription("sub1").unwrap().canceled_at,
            Some(ts("2024-03-10T00:00:00Z"))
        );
    }

    #[tokio::test]
    async fn refund_without_subscription_updates_payment() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Confirmed, None));

        let outcome = lifecycle
            .on_refunded(store.payment("p1").unwrap(), Timestamp::now())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            WebhookOutcome::PaymentUpdated { status: PaymentStatus::Refunded, .. }
        ));
    }

    #[tokio::test]
    async fn created_resets_failed_payment_to_pending() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Failed, None));

        lifecycle
            .on_created(store.payment("p1").unwrap(), Timestamp::now())
            .await
            .unwrap();

        assert_eq!(store.payment("p1").unwrap().status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn created_never_downgrades_confirmed_payment() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Confirmed, None));

        let outcome = lifecycle
            .on_created(store.payment("p1").unwrap(), Timestamp::now())
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::Stale { .. }));
        assert_eq!(store.payment("p1").unwrap().status, PaymentStatus::Confirmed);
    }

    #[tokio::test]
    async fn canceled_leaves_subscription_alone() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, Some("sub1")));
        store.insert_subscription(subscription(SubscriptionStatus::Active));

        lifecycle
            .on_canceled(store.payment("p1").unwrap(), Timestamp::now())
            .await
            .unwrap();

        assert_eq!(store.payment("p1").unwrap().status, PaymentStatus::Canceled);
        assert_eq!(store.subscription("sub1").unwrap().status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn persistence_failure_propagates() {
        let (store, lifecycle) = setup();
        store.insert_payment(payment(PaymentStatus::Pending, None));
        let p = store.payment("p1").unwrap();
        store.set_unavailable(true);

        let result = lifecycle.on_canceled(p, Timestamp::now()).await;

        assert!(result.is_err());
    }
}
