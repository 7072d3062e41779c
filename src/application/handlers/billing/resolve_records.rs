//! RecordResolver - Finds the records a Korvex transaction refers to.

use std::sync::Arc;

use crate::domain::billing::{CoursePurchase, Payment, TransactionSnapshot};
use crate::domain::foundation::DomainError;
use crate::ports::{CoursePurchaseRepository, PaymentRepository};

/// Records matched for one transaction.
///
/// A transaction normally matches only one of the two. Both are surfaced and
/// the router decides which wins.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRecords {
    pub payment: Option<Payment>,
    pub course_purchase: Option<CoursePurchase>,
}

/// Read-only lookup of payment and course purchase records.
pub struct RecordResolver {
    payments: Arc<dyn PaymentRepository>,
    course_purchases: Arc<dyn CoursePurchaseRepository>,
}

impl RecordResolver {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        course_purchases: Arc<dyn CoursePurchaseRepository>,
    ) -> Self {
        Self {
            payments,
            course_purchases,
        }
    }

    /// Looks up the payment by transaction id, then by secondary identifier,
    /// and the course purchase by transaction id.
    ///
    /// Misses are `None`; only persistence failures are errors.
    pub async fn resolve(
        &self,
        transaction: &TransactionSnapshot,
    ) -> Result<ResolvedRecords, DomainError> {
        let mut payment = self.payments.find_by_provider_id(&transaction.id).await?;

        if payment.is_none() {
            if let Some(identifier) = transaction.secondary_identifier() {
                payment = self.payments.find_by_identifier(identifier).await?;
                if payment.is_some() {
                    tracing::debug!(
                        transaction_id = %transaction.id,
                        identifier = %identifier,
                        "Payment matched by secondary identifier"
                    );
                }
            }
        }

        let course_purchase = self
            .course_purchases
            .find_by_provider_id(&transaction.id)
            .await?;

        Ok(ResolvedRecords {
            payment,
            course_purchase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::billing::{PurchaseStatus, TransactionEvent};
    use crate::domain::foundation::{
        CourseId, CoursePurchaseId, ErrorCode, PaymentId, Timestamp, UserId,
    };

    fn transaction(id: &str, identifier: Option<&str>) -> TransactionSnapshot {
        let identifier = identifier
            .map(|i| format!(r#", "identifier": "{}""#, i))
            .unwrap_or_default();
        let json = format!(
            r#"{{ "event": "TRANSACTION_PAID",
                  "transaction": {{ "id": "{}"{}, "status": "COMPLETED", "paymentMethod": "PIX" }} }}"#,
            id, identifier
        );
        TransactionEvent::from_slice(json.as_bytes()).unwrap().transaction
    }

    fn payment(id: &str, provider_id: &str, identifier: Option<&str>) -> Payment {
        let mut payment = Payment::pending(PaymentId::new(id).unwrap(), provider_id, Timestamp::now());
        payment.korvex_identifier = identifier.map(str::to_string);
        payment
    }

    fn purchase(provider_id: &str) -> CoursePurchase {
        CoursePurchase {
            id: CoursePurchaseId::new("cp1").unwrap(),
            user_id: UserId::new("u1").unwrap(),
            course_id: CourseId::new("c1").unwrap(),
            korvex_payment_id: provider_id.to_string(),
            payment_status: PurchaseStatus::Pending,
            is_active: false,
            purchased_at: None,
        }
    }

    fn resolver(store: &Arc<InMemoryBillingStore>) -> RecordResolver {
        RecordResolver::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn primary_id_match_skips_secondary_lookup() {
        let store = Arc::new(InMemoryBillingStore::new());
        store.insert_payment(payment("p1", "tx1", Some("chk-1")));

        let resolved = resolver(&store)
            .resolve(&transaction("tx1", Some("chk-1")))
            .await
            .unwrap();

        assert_eq!(resolved.payment.unwrap().id.as_str(), "p1");
        assert!(resolved.course_purchase.is_none());
        // payment by id + course purchase by id
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn falls_back_to_secondary_identifier() {
        let store = Arc::new(InMemoryBillingStore::new());
        store.insert_payment(payment("p1", "checkout-placeholder", Some("chk-1")));

        let resolved = resolver(&store)
            .resolve(&transaction("tx1", Some("chk-1")))
            .await
            .unwrap();

        assert_eq!(resolved.payment.unwrap().id.as_str(), "p1");
        assert_eq!(store.read_count(), 3);
    }

    #[tokio::test]
    async fn course_purchase_is_resolved_by_primary_id_only() {
        let store = Arc::new(InMemoryBillingStore::new());
        store.insert_course_purchase(purchase("tx1"));

        let by_primary = resolver(&store)
            .resolve(&transaction("tx1", None))
            .await
            .unwrap();
        assert!(by_primary.course_purchase.is_some());
        assert!(by_primary.payment.is_none());

        let by_secondary = resolver(&store)
            .resolve(&transaction("tx2", Some("tx1")))
            .await
            .unwrap();
        assert!(by_secondary.course_purchase.is_none());
    }

    #[tokio::test]
    async fn surfaces_both_matches() {
        let store = Arc::new(InMemoryBillingStore::new());
        store.insert_payment(payment("p1", "tx1", None));
        store.insert_course_purchase(purchase("tx1"));

        let resolved = resolver(&store).resolve(&transaction("tx1", None)).await.unwrap();
        assert!(resolved.payment.is_some());
        assert!(resolved.course_purchase.is_some());
    }

    #[tokio::test]
    async fn miss_is_not_an_error() {
        let store = Arc::new(InMemoryBillingStore::new());
        let resolved = resolver(&store).resolve(&transaction("tx404", None)).await.unwrap();
        assert!(resolved.payment.is_none());
        assert!(resolved.course_purchase.is_none());
    }

    #[tokio::test]
    async fn persistence_failure_propagates() {
        let store = Arc::new(InMemoryBillingStore::new());
        store.set_unavailable(true);
        let err = resolver(&store)
            .resolve(&transaction("tx1", None))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
