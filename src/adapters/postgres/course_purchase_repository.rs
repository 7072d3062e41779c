//! PostgreSQL implementation of CoursePurchaseRepository.

use crate::domain::billing::{CoursePurchase, PurchaseStatus};
use crate::domain::foundation::{
    CourseId, CoursePurchaseId, DomainError, ErrorCode, Timestamp, UserId,
};
use crate::ports::CoursePurchaseRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// PostgreSQL implementation of the CoursePurchaseRepository port.
pub struct PostgresCoursePurchaseRepository {
    pool: PgPool,
}

impl PostgresCoursePurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CoursePurchaseRow {
    id: String,
    user_id: String,
    course_id: String,
    korvex_payment_id: String,
    payment_status: String,
    is_active: bool,
    purchased_at: Option<DateTime<Utc>>,
}

impl TryFrom<CoursePurchaseRow> for CoursePurchase {
    type Error = DomainError;

    fn try_from(row: CoursePurchaseRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: String| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", field, e))
        };

        Ok(CoursePurchase {
            id: CoursePurchaseId::new(row.id).map_err(|e| corrupt("id", e.to_string()))?,
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e.to_string()))?,
            course_id: CourseId::new(row.course_id)
                .map_err(|e| corrupt("course_id", e.to_string()))?,
            korvex_payment_id: row.korvex_payment_id,
            payment_status: parse_status(&row.payment_status)?,
            is_active: row.is_active,
            purchased_at: row.purchased_at.map(Timestamp::from_datetime),
        })
    }
}

fn parse_status(s: &str) -> Result<PurchaseStatus, DomainError> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(PurchaseStatus::Pending),
        "completed" => Ok(PurchaseStatus::Completed),
        "failed" => Ok(PurchaseStatus::Failed),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid purchase status value: {}", s),
        )),
    }
}

#[async_trait]
impl CoursePurchaseRepository for PostgresCoursePurchaseRepository {
    async fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<CoursePurchase>, DomainError> {
        let row: Option<CoursePurchaseRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, course_id, korvex_payment_id, payment_status,
                   is_active, purchased_at
            FROM course_purchases
            WHERE korvex_payment_id = $1
            LIMIT 1
            "#,
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find course purchase: {}", e),
            )
        })?;

        row.map(CoursePurchase::try_from).transpose()
    }

    async fn update(&self, purchase: &CoursePurchase) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE course_purchases SET
                payment_status = $2,
                is_active = $3,
                purchased_at = $4
            WHERE id = $1
            "#,
        )
        .bind(purchase.id.as_str())
        .bind(purchase.payment_status.as_str())
        .bind(purchase.is_active)
        .bind(purchase.purchased_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update course purchase: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::CoursePurchaseNotFound,
                format!("Course purchase {} not found", purchase.id),
            ));
        }

        Ok(())
    }
}
