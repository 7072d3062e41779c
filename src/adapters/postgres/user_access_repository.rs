//! PostgreSQL implementations of the user access and course catalog ports.
//!
//! Both only touch the columns this service owns or needs to read:
//! `users.access_expires_at`, `users.allowed_courses`, `users.name`,
//! `users.email`, `courses.title` and `courses.price`.

use crate::domain::foundation::{CourseId, DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{CourseCatalog, CourseSummary, UserAccessRepository, UserContact};
use async_trait::async_trait;
use sqlx::PgPool;

/// PostgreSQL implementation of the UserAccessRepository port.
pub struct PostgresUserAccessRepository {
    pool: PgPool,
}

impl PostgresUserAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    name: Option<String>,
    email: Option<String>,
}

#[async_trait]
impl UserAccessRepository for PostgresUserAccessRepository {
    async fn grant_subscription_access(
        &self,
        user_id: &UserId,
        expires_at: Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                access_expires_at = $2,
                allowed_courses = NULL
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_str())
        .bind(expires_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to update user access: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::UserNotFound,
                format!("User {} not found", user_id),
            ));
        }

        Ok(())
    }

    async fn find_contact(&self, user_id: &UserId) -> Result<Option<UserContact>, DomainError> {
        let row: Option<ContactRow> = sqlx::query_as("SELECT name, email FROM users WHERE id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to find user: {}", e))
            })?;

        // A user without an email cannot receive anything.
        Ok(row.and_then(|r| {
            r.email
                .filter(|e| !e.trim().is_empty())
                .map(|email| UserContact { name: r.name, email })
        }))
    }
}

/// PostgreSQL implementation of the CourseCatalog port.
pub struct PostgresCourseCatalog {
    pool: PgPool,
}

impl PostgresCourseCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CourseRow {
    title: String,
    price: Option<i64>,
}

#[async_trait]
impl CourseCatalog for PostgresCourseCatalog {
    async fn find_summary(&self, course_id: &CourseId) -> Result<Option<CourseSummary>, DomainError> {
        let row: Option<CourseRow> =
            sqlx::query_as("SELECT title, price FROM courses WHERE id = $1")
                .bind(course_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(ErrorCode::DatabaseError, format!("Failed to find course: {}", e))
                })?;

        Ok(row.map(|r| CourseSummary {
            title: r.title,
            price_cents: r.price,
        }))
    }
}
