//! PostgreSQL implementation of PaymentRepository.
//!
//! Payments are created by checkout; this adapter only reads them and writes
//! back the fields Korvex events change.

use crate::domain::billing::{Payment, PaymentStatus};
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, SubscriptionId, Timestamp};
use crate::ports::PaymentRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// PostgreSQL implementation of the PaymentRepository port.
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column_sql: &str, value: &str) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(column_sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to find payment: {}", e))
            })?;

        row.map(Payment::try_from).transpose()
    }
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    korvex_payment_id: String,
    korvex_identifier: Option<String>,
    subscription_id: Option<String>,
    status: String,
    paid_at: Option<DateTime<Utc>>,
    metadata: Option<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let id = PaymentId::new(row.id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid payment id: {}", e))
        })?;
        let subscription_id = row
            .subscription_id
            .filter(|s| !s.is_empty())
            .map(SubscriptionId::new)
            .transpose()
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid subscription_id: {}", e))
            })?;

        Ok(Payment {
            id,
            korvex_payment_id: row.korvex_payment_id,
            korvex_identifier: row.korvex_identifier,
            subscription_id,
            status: parse_status(&row.status)?,
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            metadata: row.metadata,
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_status(s: &str) -> Result<PaymentStatus, DomainError> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(PaymentStatus::Pending),
        "confirmed" => Ok(PaymentStatus::Confirmed),
        "failed" => Ok(PaymentStatus::Failed),
        "canceled" => Ok(PaymentStatus::Canceled),
        "refunded" => Ok(PaymentStatus::Refunded),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid payment status value: {}", s),
        )),
    }
}

const SELECT_BY_PROVIDER_ID: &str = r#"
    SELECT id, korvex_payment_id, korvex_identifier, subscription_id, status,
           paid_at, metadata, updated_at
    FROM payments
    WHERE korvex_payment_id = $1
    LIMIT 1
"#;

const SELECT_BY_IDENTIFIER: &str = r#"
    SELECT id, korvex_payment_id, korvex_identifier, subscription_id, status,
           paid_at, metadata, updated_at
    FROM payments
    WHERE korvex_identifier = $1
    LIMIT 1
"#;

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<Payment>, DomainError> {
        self.find_one(SELECT_BY_PROVIDER_ID, provider_id).await
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Payment>, DomainError> {
        self.find_one(SELECT_BY_IDENTIFIER, identifier).await
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                subscription_id = $3,
                paid_at = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_str())
        .bind(payment.status.as_str())
        .bind(payment.subscription_id.as_ref().map(|s| s.as_str()))
        .bind(payment.paid_at.map(|t| *t.as_datetime()))
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to update payment: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", payment.id),
            ));
        }

        Ok(())
    }
}
