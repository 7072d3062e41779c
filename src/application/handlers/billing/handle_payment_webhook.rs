//! HandlePaymentWebhookHandler - Command handler for Korvex webhook deliveries.
//!
//! Decodes the envelope, checks the shared secret, resolves the records the
//! transaction refers to and routes the event:
//!
//! | Event                  | Action                                              |
//! |------------------------|-----------------------------------------------------|
//! | `TRANSACTION_CREATED`  | payment back to pending                             |
//! | `TRANSACTION_PAID`     | course purchase if matched, else payment/subscription |
//! | `TRANSACTION_CANCELED` | payment canceled                                    |
//! | `TRANSACTION_REFUNDED` | payment refunded, linked subscription canceled      |
//! | anything else          | acknowledged, nothing read or written               |

use std::sync::Arc;

use super::{
    AccessCascade, CoursePurchaseFinalizer, PurchaseReceiptDispatcher, RecordResolver,
    ResolvedRecords, SubscriptionLifecycle,
};
use crate::domain::billing::{
    EventKind, PaymentStatus, TransactionEvent, WebhookAuthenticator, WebhookError,
};
use crate::domain::foundation::Timestamp;
use crate::ports::{
    CourseCatalog, CoursePurchaseRepository, EmailSender, PaymentRepository,
    SubscriptionRepository, UserAccessRepository,
};

/// Command to handle a Korvex webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw request body.
    pub payload: Vec<u8>,
}

/// What processing an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Subscription activated or renewed and access granted.
    SubscriptionActivated {
        payment_id: String,
        subscription_id: String,
        user_id: String,
        period_end: Timestamp,
        /// True when the subscription row was created by this event.
        created: bool,
    },
    /// Refund canceled the linked subscription.
    SubscriptionCanceled {
        payment_id: String,
        subscription_id: String,
    },
    /// Payment confirmed without any subscription change.
    PaymentConfirmed { payment_id: String },
    /// Payment status set (or already set) with no subscription change.
    PaymentUpdated {
        payment_id: String,
        status: PaymentStatus,
    },
    CoursePurchaseCompleted {
        purchase_id: String,
        receipt_sent: bool,
    },
    CoursePurchaseFailed { purchase_id: String },
    /// Event arrived after the record moved past it; nothing written.
    Stale { record_id: String, reason: String },
    /// No record matches the transaction.
    NotFound { transaction_id: String },
    /// Event acknowledged but no action taken.
    Acknowledged,
    /// Event kind not handled by this service.
    Ignored,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlePaymentWebhookResult {
    pub event: EventKind,
    pub outcome: WebhookOutcome,
}

/// Ports the webhook handler works against.
#[derive(Clone)]
pub struct BillingPorts {
    pub payments: Arc<dyn PaymentRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub course_purchases: Arc<dyn CoursePurchaseRepository>,
    pub users: Arc<dyn UserAccessRepository>,
    pub courses: Arc<dyn CourseCatalog>,
    pub email: Arc<dyn EmailSender>,
}

/// Handler for Korvex webhook deliveries.
pub struct HandlePaymentWebhookHandler {
    authenticator: Arc<WebhookAuthenticator>,
    resolver: RecordResolver,
    lifecycle: SubscriptionLifecycle,
    finalizer: CoursePurchaseFinalizer,
}

impl HandlePaymentWebhookHandler {
    pub fn new(ports: BillingPorts, authenticator: Arc<WebhookAuthenticator>) -> Self {
        let resolver = RecordResolver::new(ports.payments.clone(), ports.course_purchases.clone());
        let lifecycle = SubscriptionLifecycle::new(
            ports.payments,
            ports.subscriptions,
            AccessCascade::new(ports.users.clone()),
        );
        let finalizer = CoursePurchaseFinalizer::new(
            ports.course_purchases,
            PurchaseReceiptDispatcher::new(ports.users, ports.courses, ports.email),
        );
        Self {
            authenticator,
            resolver,
            lifecycle,
            finalizer,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        // 1. Decode (the token travels inside the envelope)
        let event = TransactionEvent::from_slice(&cmd.payload).map_err(|e| {
            tracing::warn!(error = %e, "Rejected malformed Korvex envelope");
            e
        })?;

        // 2. Authenticate
        if let Err(e) = self.authenticator.verify(event.token.as_ref()) {
            tracing::warn!(
                event = %event.event,
                transaction_id = %event.transaction.id,
                "Rejected Korvex envelope with invalid token"
            );
            return Err(e);
        }

        // 3. Unknown kinds never touch persistence
        if !event.event.is_known() {
            tracing::info!(
                event = %event.event,
                transaction_id = %event.transaction.id,
                "Ignoring unsupported Korvex event"
            );
            return Ok(HandlePaymentWebhookResult {
                event: event.event,
                outcome: WebhookOutcome::Ignored,
            });
        }

        // 4. Resolve and route
        let resolved = self.resolver.resolve(&event.transaction).await?;
        let outcome = self.route(&event, resolved, Timestamp::now()).await?;

        tracing::info!(
            event = %event.event,
            transaction_id = %event.transaction.id,
            outcome = ?outcome,
            "Processed Korvex event"
        );

        Ok(HandlePaymentWebhookResult {
            event: event.event,
            outcome,
        })
    }

    async fn route(
        &self,
        event: &TransactionEvent,
        resolved: ResolvedRecords,
        now: Timestamp,
    ) -> Result<WebhookOutcome, WebhookError> {
        let transaction = &event.transaction;

        let outcome = match (&event.event, resolved) {
            (
                EventKind::TransactionPaid,
                ResolvedRecords {
                    course_purchase: Some(purchase),
                    payment,
                },
            ) => {
                if let Some(payment) = payment {
                    tracing::warn!(
                        transaction_id = %transaction.id,
                        payment_id = %payment.id,
                        purchase_id = %purchase.id,
                        "Transaction matches both a payment and a course purchase; finalizing the purchase"
                    );
                }
                self.finalizer.on_paid(purchase, transaction, now).await?
            }
            (_, ResolvedRecords { payment: None, .. }) => {
                tracing::warn!(
                    event = %event.event,
                    transaction_id = %transaction.id,
                    "No payment found for Korvex transaction"
                );
                WebhookOutcome::NotFound {
                    transaction_id: transaction.id.clone(),
                }
            }
            (kind, ResolvedRecords { payment: Some(payment), .. }) => match kind {
                EventKind::TransactionCreated => self.lifecycle.on_created(payment, now).await?,
                EventKind::TransactionPaid => {
                    self.lifecycle
                        .on_paid(payment, transaction, event.subscription.as_ref(), now)
                        .await?
                }
                EventKind::TransactionCanceled => self.lifecycle.on_canceled(payment, now).await?,
                EventKind::TransactionRefunded => self.lifecycle.on_refunded(payment, now).await?,
                EventKind::Unknown(_) => WebhookOutcome::Ignored,
            },
        };

        Ok(outcome)
    }
}
