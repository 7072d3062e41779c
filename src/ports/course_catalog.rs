//! Course catalog port (read-only).

use async_trait::async_trait;

use crate::domain::foundation::{CourseId, DomainError};

/// Title and list price of a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSummary {
    pub title: String,
    /// List price in cents.
    pub price_cents: Option<i64>,
}

#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Returns `None` if the course is unknown.
    async fn find_summary(&self, course_id: &CourseId) -> Result<Option<CourseSummary>, DomainError>;
}
