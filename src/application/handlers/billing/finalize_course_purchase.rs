//! CoursePurchaseFinalizer - Settles standalone course purchases.

use std::sync::Arc;

use super::{PurchaseReceipt, PurchaseReceiptDispatcher, WebhookOutcome};
use crate::domain::billing::{CoursePurchase, TransactionSnapshot, TransactionStatus};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::CoursePurchaseRepository;

/// Completes or fails a course purchase on TRANSACTION_PAID.
///
/// Course purchases never touch subscriptions or the access cascade; the
/// purchase row itself grants the course.
pub struct CoursePurchaseFinalizer {
    purchases: Arc<dyn CoursePurchaseRepository>,
    receipts: PurchaseReceiptDispatcher,
}

impl CoursePurchaseFinalizer {
    pub fn new(
        purchases: Arc<dyn CoursePurchaseRepository>,
        receipts: PurchaseReceiptDispatcher,
    ) -> Self {
        Self {
            purchases,
            receipts,
        }
    }

    pub async fn on_paid(
        &self,
        mut purchase: CoursePurchase,
        transaction: &TransactionSnapshot,
        now: Timestamp,
    ) -> Result<WebhookOutcome, DomainError> {
        match transaction.status {
            TransactionStatus::Completed => {
                match purchase.complete(transaction.paid_at, now) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(purchase_id = %purchase.id, "Course purchase already completed");
                        return Ok(WebhookOutcome::Acknowledged);
                    }
                    Err(e) => return Ok(stale(&purchase, e.to_string())),
                }
                self.purchases.update(&purchase).await?;
                tracing::info!(
                    purchase_id = %purchase.id,
                    user_id = %purchase.user_id,
                    course_id = %purchase.course_id,
                    "Course purchase completed"
                );

                let receipt_sent = self
                    .receipts
                    .dispatch(PurchaseReceipt {
                        user_id: purchase.user_id.clone(),
                        course_id: purchase.course_id.clone(),
                        amount_cents: transaction.amount,
                        paid_at: purchase.purchased_at.unwrap_or(now),
                    })
                    .await;

                Ok(WebhookOutcome::CoursePurchaseCompleted {
                    purchase_id: purchase.id.to_string(),
                    receipt_sent,
                })
            }
            TransactionStatus::Failed => match purchase.fail() {
                Ok(true) => {
                    self.purchases.update(&purchase).await?;
                    tracing::info!(purchase_id = %purchase.id, "Course purchase failed");
                    Ok(WebhookOutcome::CoursePurchaseFailed {
                        purchase_id: purchase.id.to_string(),
                    })
                }
                Ok(false) => Ok(WebhookOutcome::Acknowledged),
                Err(e) => Ok(stale(&purchase, e.to_string())),
            },
            ref other => {
                tracing::warn!(
                    purchase_id = %purchase.id,
                    transaction_status = %other,
                    "Paid event with unhandled transaction status for course purchase, ignoring"
                );
                Ok(WebhookOutcome::Acknowledged)
            }
        }
    }
}

fn stale(purchase: &CoursePurchase, reason: String) -> WebhookOutcome {
    tracing::info!(
        purchase_id = %purchase.id,
        status = %purchase.payment_status.as_str(),
        reason = %reason,
        "Stale event for course purchase, ignoring"
    );
    WebhookOutcome::Stale {
        record_id: purchase.id.to_string(),
        reason,
    }
}
